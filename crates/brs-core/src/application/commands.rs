//! Subscription command surface
//!
//! | Tagged                  | JSON-RPC             | Effect                               |
//! |-------------------------|----------------------|--------------------------------------|
//! | `SUBSCRIBE`             | `subscribe`          | start receiving new results          |
//! | `UNSUBSCRIBE`           | `unsubscribe`        | stop receiving new results           |
//! | `REPLAY`                | `get_battle_results` | results recorded after `after`       |
//! | `REPLAY_AND_SUBSCRIBE`  |                      | replay, then subscribe with no gap   |

use std::sync::Arc;

use brs_domain::{Timestamp, prelude::*};
use serde_json::Value;
use tracing::info;

use super::dispatcher::{CallContext, Dispatcher, Reply};
use super::ports::Connection;
use super::services::ResultLog;
use crate::protocol::RESULT_MESSAGE_TYPE;

/// Tagged command names
pub mod names {
    /// Start receiving new results
    pub const SUBSCRIBE: &str = "SUBSCRIBE";
    /// Stop receiving new results
    pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
    /// Fetch stored results
    pub const REPLAY: &str = "REPLAY";
    /// Replay, then subscribe
    pub const REPLAY_AND_SUBSCRIBE: &str = "REPLAY_AND_SUBSCRIBE";

    /// JSON-RPC alias of `SUBSCRIBE`
    pub const RPC_SUBSCRIBE: &str = "subscribe";
    /// JSON-RPC alias of `UNSUBSCRIBE`
    pub const RPC_UNSUBSCRIBE: &str = "unsubscribe";
    /// JSON-RPC alias of `REPLAY`
    pub const RPC_GET_BATTLE_RESULTS: &str = "get_battle_results";
}

fn replay_params() -> SharedValidator {
    record([optional_field("after", number())])
}

fn after_of(params: &Value) -> Timestamp {
    params
        .get("after")
        .and_then(Value::as_f64)
        .map_or(Timestamp::EPOCH, Timestamp::from_secs)
}

/// Register every subscription command on `dispatcher`
pub fn register_commands(dispatcher: &mut Dispatcher<Connection>, log: &Arc<ResultLog>) {
    for name in [names::SUBSCRIBE, names::RPC_SUBSCRIBE] {
        let log = Arc::clone(log);
        dispatcher.register(name, record([]), move |_, ctx: CallContext<Connection>| {
            let log = Arc::clone(&log);
            async move {
                if log.subscribe(&ctx.context, ctx.flavor) {
                    info!(
                        connection = %ctx.context.id(),
                        flavor = %ctx.flavor,
                        "Connection subscribed"
                    );
                }
                Ok(Reply::Empty)
            }
        });
    }

    for name in [names::UNSUBSCRIBE, names::RPC_UNSUBSCRIBE] {
        let log = Arc::clone(log);
        dispatcher.register(name, record([]), move |_, ctx: CallContext<Connection>| {
            let log = Arc::clone(&log);
            async move {
                if log.unsubscribe(ctx.context.id()) {
                    info!(connection = %ctx.context.id(), "Connection unsubscribed");
                }
                Ok(Reply::Empty)
            }
        });
    }

    for name in [names::REPLAY, names::RPC_GET_BATTLE_RESULTS] {
        let log = Arc::clone(log);
        dispatcher.register(name, replay_params(), move |params, _| {
            let log = Arc::clone(&log);
            async move {
                let items = log
                    .replay(after_of(&params))
                    .iter()
                    .map(|record| record.to_wire())
                    .collect();
                Ok(Reply::Messages {
                    kind: RESULT_MESSAGE_TYPE.to_string(),
                    items,
                })
            }
        });
    }

    let log = Arc::clone(log);
    dispatcher.register(
        names::REPLAY_AND_SUBSCRIBE,
        replay_params(),
        move |params, ctx: CallContext<Connection>| {
            let log = Arc::clone(&log);
            async move {
                let replayed =
                    log.replay_and_subscribe(&ctx.context, ctx.flavor, after_of(&params));
                info!(
                    connection = %ctx.context.id(),
                    replayed,
                    "Connection replayed and subscribed"
                );
                Ok(Reply::Empty)
            }
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_after_defaults_to_epoch() {
        assert_eq!(after_of(&json!({})), Timestamp::EPOCH);
        assert_eq!(after_of(&json!({"after": 12.5})), Timestamp::from_secs(12.5));
    }

    #[test]
    fn test_replay_params_reject_non_number() {
        let err = replay_params().validate(&json!({"after": "x"})).unwrap_err();
        assert_eq!(err.to_string(), "Expected $.after to be a number.");
    }
}
