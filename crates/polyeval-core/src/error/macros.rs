//! Error macros for polyeval

/// Macro for creating invalid value errors
#[macro_export]
macro_rules! bail_invalid {
    ($context:expr, $value:expr) => {
        return Err($crate::error::BenchError::invalid_value($context, $value))
    };
}

/// Macro for creating usage errors
#[macro_export]
macro_rules! bail_usage {
    ($msg:expr) => {
        return Err($crate::error::BenchError::UsageError($msg.to_string()))
    };
}

/// Macro for creating dataset shape errors
#[macro_export]
macro_rules! bail_dataset {
    ($dataset:expr, $reason:expr) => {
        return Err($crate::error::BenchError::dataset_shape($dataset, $reason))
    };
}
