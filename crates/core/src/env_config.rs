//! Environment variable parsing with warn-level logging for invalid values.

/// Read an operational knob from the environment.
///
/// Unset means `default`. A value that does not parse also means `default`,
/// but is logged so a typo in a deployment does not go unnoticed.
pub fn env_parse_with_default<T: std::str::FromStr + std::fmt::Display>(
    var: &str,
    default: T,
) -> T {
    let Ok(raw) = std::env::var(var) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(var, value = %raw, default = %default, "invalid env var value, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // SAFETY: each test owns a unique variable name, so concurrent tests never
    // observe each other's writes.
    #[test]
    fn test_env_parse_valid_value() {
        let var_name = "TEMBA_MIGRATE_TEST_ENV_VALID_41871";
        unsafe { std::env::set_var(var_name, "42") };
        let result: u32 = env_parse_with_default(var_name, 10);
        assert_eq!(result, 42);
        unsafe { std::env::remove_var(var_name) };
    }

    #[test]
    fn test_env_parse_invalid_value() {
        let var_name = "TEMBA_MIGRATE_TEST_ENV_INVALID_41872";
        unsafe { std::env::set_var(var_name, "banana") };
        let result: u32 = env_parse_with_default(var_name, 10);
        assert_eq!(result, 10);
        unsafe { std::env::remove_var(var_name) };
    }

    #[test]
    fn test_env_parse_missing_var() {
        let var_name = "TEMBA_MIGRATE_TEST_ENV_MISSING_41873";
        unsafe { std::env::remove_var(var_name) };
        let result: u64 = env_parse_with_default(var_name, 7);
        assert_eq!(result, 7);
    }

    #[test]
    fn test_env_parse_padded_value() {
        let var_name = "TEMBA_MIGRATE_TEST_ENV_PADDED_41874";
        unsafe { std::env::set_var(var_name, " 15 ") };
        let result: u32 = env_parse_with_default(var_name, 10);
        assert_eq!(result, 15);
        unsafe { std::env::remove_var(var_name) };
    }
}
