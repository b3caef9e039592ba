use std::env;
use std::str::FromStr;

use crate::error::{ClusterError, Result};

/// Reads an environment variable and parses it into `T`.
///
/// # Returns
/// - `Ok(None)` when the variable is unset or blank
/// - `Err(ClusterError::Configuration)` when it is set but cannot be parsed; a typo in a
///   weight must never quietly fall back to the default
pub fn get_env_var_as<T>(var: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|err| {
            ClusterError::Configuration(format!("{} has invalid value '{}': {}", var, raw, err))
        }),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ClusterError::Configuration(format!(
            "{} is not valid unicode",
            var
        ))),
    }
}

/// Overwrites `target` with the parsed value of `var` when it is set.
pub fn override_from_env<T>(var: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = get_env_var_as::<T>(var)? {
        *target = value;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_variable_keeps_default() {
        let mut threshold = 0.55_f64;
        override_from_env("NEWSROOM_CLUSTERS_TEST_UNSET_VAR", &mut threshold).unwrap();
        assert_eq!(threshold, 0.55);
    }

    #[test]
    fn unparsable_value_is_a_configuration_error() {
        env::set_var("NEWSROOM_CLUSTERS_TEST_BAD_FLOAT", "zero point five");
        let result = get_env_var_as::<f64>("NEWSROOM_CLUSTERS_TEST_BAD_FLOAT");
        assert!(matches!(result, Err(ClusterError::Configuration(_))));
        env::remove_var("NEWSROOM_CLUSTERS_TEST_BAD_FLOAT");
    }
}
