use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::KeyValueDriver;

/// Redis over a multiplexed async connection opened per command.
pub struct RedisDriver;

#[async_trait]
impl KeyValueDriver for RedisDriver {
    async fn command(&self, uri: &str, name: &str, args: &[String]) -> Result<Value> {
        let client = ::redis::Client::open(uri).context("Invalid Redis connection URI")?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        let mut cmd = ::redis::cmd(name);
        for arg in args {
            cmd.arg(arg);
        }
        let reply: ::redis::Value = cmd.query_async(&mut conn).await?;
        Ok(reply_to_json(reply))
    }
}

pub fn reply_to_json(reply: ::redis::Value) -> Value {
    match reply {
        ::redis::Value::Nil => Value::Null,
        ::redis::Value::Int(n) => Value::from(n),
        ::redis::Value::Data(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        ::redis::Value::Bulk(items) => Value::Array(items.into_iter().map(reply_to_json).collect()),
        ::redis::Value::Status(status) => Value::String(status),
        ::redis::Value::Okay => Value::String("OK".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_to_json() {
        assert_eq!(reply_to_json(::redis::Value::Nil), Value::Null);
        assert_eq!(reply_to_json(::redis::Value::Int(3)), json!(3));
        assert_eq!(reply_to_json(::redis::Value::Okay), json!("OK"));
        assert_eq!(
            reply_to_json(::redis::Value::Status("PONG".to_string())),
            json!("PONG")
        );
        assert_eq!(
            reply_to_json(::redis::Value::Bulk(vec![
                ::redis::Value::Data(b"a".to_vec()),
                ::redis::Value::Nil,
            ])),
            json!(["a", null])
        );
    }
}
