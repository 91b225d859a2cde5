pub type Result<T> = std::result::Result<T, crate::error::Error>;

#[macro_export]
macro_rules! verify_arg {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_arg(result, stringify!($name), stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_arg(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        bad_value(name, condition)
    }
}

#[cold]
pub fn bad_value(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::BadValue {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}
