/// Compile-time assertion over constant expressions.
macro_rules! static_assert {
    ($cond:expr, $msg:literal $(,)?) => {
        const _: () = assert!($cond, $msg);
    };
    ($cond:expr $(,)?) => {
        const _: () = assert!($cond, concat!("static assertion failed: ", stringify!($cond)));
    };
}

pub(crate) use static_assert;
