//! Shared message formatting.

use crate::error::LotteryError;
use crate::surface::Presentation;

/// `"s"` unless `count` is exactly one.
pub fn plural(count: u64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

/// Final message for a failed workflow.
///
/// Precondition rejections read as a plain refusal; anything else names the activity that broke.
pub fn failure_text(err: &LotteryError, activity: &str) -> String {
    if err.is_rejection() {
        format!("❌ {err}")
    } else {
        format!("❌ Error {activity}: {err}")
    }
}

pub fn failure(err: &LotteryError, activity: &str) -> Presentation {
    Presentation::text(failure_text(err, activity))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_not_wrapped() {
        let err = LotteryError::InsufficientFunds {
            required: "5".to_string(),
            symbol: "RLUSD".to_string(),
        };
        assert_eq!(
            failure_text(&err, "buying tickets"),
            "❌ Insufficient RLUSD. You need 5 RLUSD."
        );
    }

    #[test]
    fn execution_errors_name_the_activity() {
        let err = LotteryError::ExecutionFailed("execution reverted: not owner".to_string());
        assert_eq!(
            failure_text(&err, "drawing lottery"),
            "❌ Error drawing lottery: execution reverted: not owner"
        );
        assert_eq!(plural(1), "");
        assert_eq!(plural(2), "s");
    }
}
