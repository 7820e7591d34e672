//! [`SnmpConnector`] backed by `snmp2` v2c sessions over UDP/161.

use std::time::Duration;

use async_trait::async_trait;
use snmp2::{AsyncSession, Oid, Value};
use tokio::time::timeout;
use tracing::debug;

use lanscope_common::config::SwitchTarget;
use lanscope_common::error::SnmpError;
use lanscope_protocols::snmp::{DisplayOid, SnmpValue, WalkRow};

use super::{SnmpConnector, SnmpSession};

const SNMP_PORT: u16 = 161;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_REPETITIONS: u32 = 25;

pub struct Snmp2Connector {
    request_timeout: Duration,
}

impl Default for Snmp2Connector {
    fn default() -> Self {
        Self {
            request_timeout: REQUEST_TIMEOUT,
        }
    }
}

#[async_trait]
impl SnmpConnector for Snmp2Connector {
    async fn connect(&self, target: &SwitchTarget) -> Result<Box<dyn SnmpSession>, SnmpError> {
        let addr = format!("{}:{SNMP_PORT}", target.ip);
        let session = timeout(
            self.request_timeout,
            AsyncSession::new_v2c(addr.as_str(), target.community.as_bytes(), 0),
        )
        .await
        .map_err(|_| SnmpError::Timeout(target.ip.clone()))?
        .map_err(|e| SnmpError::Transport {
            target: target.ip.clone(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(Snmp2Session {
            session,
            target: target.ip.clone(),
            request_timeout: self.request_timeout,
        }))
    }
}

struct Snmp2Session {
    session: AsyncSession,
    target: String,
    request_timeout: Duration,
}

fn transport_error(target: &str, e: snmp2::Error) -> SnmpError {
    SnmpError::Transport {
        target: target.to_string(),
        reason: format!("{e:?}"),
    }
}

#[async_trait]
impl SnmpSession for Snmp2Session {
    async fn get(&mut self, oid: &[u64]) -> Result<SnmpValue, SnmpError> {
        let request = Oid::from(oid).map_err(|_| SnmpError::InvalidOid(DisplayOid(oid).to_string()))?;
        let mut response = match timeout(self.request_timeout, self.session.get(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(transport_error(&self.target, e)),
            Err(_) => return Err(SnmpError::Timeout(self.target.clone())),
        };
        Ok(response
            .varbinds
            .next()
            .map(|(_, value)| owned_value(&value))
            .unwrap_or(SnmpValue::Unknown))
    }

    async fn walk(&mut self, base: &[u64]) -> Result<Vec<WalkRow>, SnmpError> {
        let mut rows: Vec<WalkRow> = Vec::new();
        let mut cursor = base.to_vec();

        loop {
            let request =
                Oid::from(&cursor).map_err(|_| SnmpError::InvalidOid(DisplayOid(&cursor).to_string()))?;
            let response = match timeout(
                self.request_timeout,
                self.session.getbulk(&[&request], 0, MAX_REPETITIONS),
            )
            .await
            {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(transport_error(&self.target, e)),
                Err(_) => return Err(SnmpError::Timeout(self.target.clone())),
            };

            let before = rows.len();
            let mut finished = false;
            for (oid, value) in response.varbinds {
                let Some(id) = oid.iter().map(|parts| parts.collect::<Vec<u64>>()) else {
                    return Err(SnmpError::MalformedRow {
                        oid: oid.to_id_string(),
                        reason: "sub-identifier exceeds 64 bits".into(),
                    });
                };
                let end_of_view = matches!(
                    value,
                    Value::EndOfMibView | Value::NoSuchObject | Value::NoSuchInstance
                );
                // Leaving the subtree or failing to advance both end the walk.
                if end_of_view || !id.starts_with(base) || id <= cursor {
                    finished = true;
                    break;
                }
                rows.push((id.clone(), owned_value(&value)));
                cursor = id;
            }

            if finished || rows.len() == before {
                break;
            }
        }

        debug!("{}: walked {} rows under {}", self.target, rows.len(), DisplayOid(base));
        Ok(rows)
    }
}

fn owned_value(value: &Value<'_>) -> SnmpValue {
    match value {
        Value::Integer(i) => SnmpValue::Integer(*i),
        Value::OctetString(bytes) => SnmpValue::OctetString(bytes.to_vec()),
        Value::Counter32(v) => SnmpValue::Counter32(*v),
        Value::Unsigned32(v) => SnmpValue::Unsigned32(*v),
        Value::Timeticks(v) => SnmpValue::Timeticks(*v),
        Value::Counter64(v) => SnmpValue::Counter64(*v),
        _ => SnmpValue::Unknown,
    }
}
