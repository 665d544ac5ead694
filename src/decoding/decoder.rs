use ethers::types::{Address, H256, U256};
use thiserror::Error;

use super::schema::{EventKind, EventSchema, FieldKind, FieldSpec, CATALOG};
use crate::models::{LogEvent, PoolRecord};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No schema for event {0}")]
    UnknownEvent(String),

    #[error("topic0 {found:?} is not the signature of {event}")]
    SignatureMismatch { event: &'static str, found: H256 },

    #[error("{event} expects {expected} topics, log has {found}")]
    MissingTopics { event: &'static str, expected: usize, found: usize },

    #[error("{event} expects {expected} data bytes, log has {found}")]
    MalformedData { event: &'static str, expected: usize, found: usize },

    #[error("{event}.{field} does not fit its declared type")]
    ValueOutOfRange { event: &'static str, field: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedValue {
    Address(Address),
    Uint(U256),
    Int(i64),
}

/// Typed domain event produced from a raw log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainEvent {
    PoolDeployed(PoolRecord),
    Upgraded { implementation: Address },
    AdminChanged { previous_admin: Address, new_admin: Address },
    BeaconUpgraded { beacon: Address },
}

impl DomainEvent {
    pub fn is_upgrade(&self) -> bool {
        !matches!(self, DomainEvent::PoolDeployed(_))
    }
}

/// Events from one batch that decoded, plus the ones that were skipped.
#[derive(Debug, Default)]
pub struct DecodedBatch {
    pub events: Vec<DomainEvent>,
    pub skipped: Vec<SkippedEvent>,
}

#[derive(Debug, Clone)]
pub struct SkippedEvent {
    pub block_number: u64,
    pub log_index: u64,
    pub error: DecodeError,
}

pub struct EventDecoder {
    catalog: Vec<&'static EventSchema>,
}

impl EventDecoder {
    pub fn new(catalog: Vec<&'static EventSchema>) -> Self {
        Self { catalog }
    }

    pub fn schema(&self, name: &str) -> Result<&'static EventSchema, DecodeError> {
        self.catalog
            .iter()
            .find(|schema| schema.name == name)
            .copied()
            .ok_or_else(|| DecodeError::UnknownEvent(name.to_string()))
    }

    /// `topics[0]` values of every known event, for log filters.
    pub fn topics(&self) -> Vec<H256> {
        self.catalog.iter().map(|schema| schema.topic0()).collect()
    }

    /// Decode against the schema whose signature matches `topics[0]`.
    pub fn decode_any(&self, log: &LogEvent) -> Result<DomainEvent, DecodeError> {
        let topic0 = log
            .topics
            .first()
            .ok_or_else(|| DecodeError::UnknownEvent("anonymous log".to_string()))?;
        let schema = self
            .catalog
            .iter()
            .find(|schema| schema.topic0() == *topic0)
            .ok_or_else(|| DecodeError::UnknownEvent(format!("{:?}", topic0)))?;
        decode(log, schema)
    }

    /// Decode every log; failures are collected, never fatal to the batch.
    pub fn decode_batch(&self, logs: &[LogEvent]) -> DecodedBatch {
        let mut batch = DecodedBatch::default();
        for log in logs {
            match self.decode_any(log) {
                Ok(event) => batch.events.push(event),
                Err(error) => batch.skipped.push(SkippedEvent {
                    block_number: log.block_number,
                    log_index: log.log_index,
                    error,
                }),
            }
        }
        batch
    }
}

impl Default for EventDecoder {
    fn default() -> Self {
        Self::new(CATALOG.to_vec())
    }
}

/// Decode one raw log with an explicit schema.
pub fn decode(log: &LogEvent, schema: &EventSchema) -> Result<DomainEvent, DecodeError> {
    let event = schema.name;

    let Some(found) = log.topics.first().copied() else {
        return Err(DecodeError::MissingTopics {
            event,
            expected: schema.topic_count(),
            found: 0,
        });
    };
    if found != schema.topic0() {
        return Err(DecodeError::SignatureMismatch { event, found });
    }
    if log.topics.len() != schema.topic_count() {
        return Err(DecodeError::MissingTopics {
            event,
            expected: schema.topic_count(),
            found: log.topics.len(),
        });
    }
    if log.data.len() != schema.data_len() {
        return Err(DecodeError::MalformedData {
            event,
            expected: schema.data_len(),
            found: log.data.len(),
        });
    }

    let mut fields = Fields { event, values: Vec::with_capacity(schema.indexed.len() + schema.data.len()) };
    for (spec, topic) in schema.indexed.iter().zip(&log.topics[1..]) {
        fields.push(spec, topic.as_bytes())?;
    }
    for (spec, word) in schema.data.iter().zip(log.data.chunks_exact(32)) {
        fields.push(spec, word)?;
    }

    let domain = match schema.kind {
        EventKind::PoolDeployed | EventKind::SovereignPoolDeployed => {
            let fee = match fields.get("fee") {
                Some(DecodedValue::Uint(value)) => Some(value.as_u32()),
                _ => None,
            };
            let tick_spacing = match fields.get("tickSpacing") {
                Some(DecodedValue::Int(value)) => Some(
                    i32::try_from(value).map_err(|_| DecodeError::ValueOutOfRange { event, field: "tickSpacing" })?,
                ),
                _ => None,
            };
            DomainEvent::PoolDeployed(PoolRecord {
                address: fields.address("pool")?,
                token0: fields.address("token0")?,
                token1: fields.address("token1")?,
                fee,
                tick_spacing,
                deployment_block: log.block_number,
                transaction_hash: log.transaction_hash,
            })
        }
        EventKind::Upgraded => DomainEvent::Upgraded {
            implementation: fields.address("implementation")?,
        },
        EventKind::AdminChanged => DomainEvent::AdminChanged {
            previous_admin: fields.address("previousAdmin")?,
            new_admin: fields.address("newAdmin")?,
        },
        EventKind::BeaconUpgraded => DomainEvent::BeaconUpgraded {
            beacon: fields.address("beacon")?,
        },
    };
    Ok(domain)
}

struct Fields {
    event: &'static str,
    values: Vec<(&'static str, DecodedValue)>,
}

impl Fields {
    fn push(&mut self, spec: &FieldSpec, word: &[u8]) -> Result<(), DecodeError> {
        let value = decode_word(word, spec.kind).ok_or(DecodeError::ValueOutOfRange {
            event: self.event,
            field: spec.name,
        })?;
        self.values.push((spec.name, value));
        Ok(())
    }

    fn get(&self, name: &str) -> Option<DecodedValue> {
        self.values.iter().find(|(field, _)| *field == name).map(|(_, value)| *value)
    }

    fn address(&self, name: &'static str) -> Result<Address, DecodeError> {
        match self.get(name) {
            Some(DecodedValue::Address(address)) => Ok(address),
            _ => Err(DecodeError::ValueOutOfRange { event: self.event, field: name }),
        }
    }
}

/// Decode one 32-byte ABI word. `None` when the value does not fit the type.
pub fn decode_word(word: &[u8], kind: FieldKind) -> Option<DecodedValue> {
    if word.len() != 32 {
        return None;
    }
    match kind {
        FieldKind::Address => Some(DecodedValue::Address(Address::from_slice(&word[12..]))),
        FieldKind::Uint(bits) => {
            let value = U256::from_big_endian(word);
            if bits < 256 && value.bits() > bits as usize {
                return None;
            }
            Some(DecodedValue::Uint(value))
        }
        FieldKind::Int(bits) => {
            if bits == 0 || bits > 64 {
                return None;
            }
            let mut low = [0u8; 8];
            low.copy_from_slice(&word[24..]);
            let value = i64::from_be_bytes(low);
            let fill = if value < 0 { 0xFF } else { 0x00 };
            if word[..24].iter().any(|b| *b != fill) {
                return None;
            }
            let min = -(1i128 << (bits - 1));
            let max = (1i128 << (bits - 1)) - 1;
            if (value as i128) < min || (value as i128) > max {
                return None;
            }
            Some(DecodedValue::Int(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoding::schema::{POOL_DEPLOYED, SOVEREIGN_POOL_DEPLOYED, UPGRADED};
    use ethers::types::Bytes;

    fn address_word(address: Address) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[12..].copy_from_slice(address.as_bytes());
        word
    }

    fn int_word(value: i64) -> [u8; 32] {
        let mut word = if value < 0 { [0xFF; 32] } else { [0u8; 32] };
        word[24..].copy_from_slice(&value.to_be_bytes());
        word
    }

    fn log(topics: Vec<H256>, data: Vec<u8>) -> LogEvent {
        LogEvent {
            address: Address::repeat_byte(0xFA),
            topics,
            data: Bytes::from(data),
            block_number: 100,
            log_index: 3,
            transaction_hash: H256::repeat_byte(0x77),
        }
    }

    #[test]
    fn test_sovereign_pool_deployed() {
        let token0 = Address::repeat_byte(0x01);
        let token1 = Address::repeat_byte(0x02);
        let pool = Address::repeat_byte(0xAA);
        let raw = log(
            vec![
                SOVEREIGN_POOL_DEPLOYED.topic0(),
                H256::from(address_word(token0)),
                H256::from(address_word(token1)),
            ],
            address_word(pool).to_vec(),
        );

        let DomainEvent::PoolDeployed(record) = decode(&raw, &SOVEREIGN_POOL_DEPLOYED).unwrap() else {
            panic!("expected a pool");
        };
        assert_eq!(record.address, pool);
        assert_eq!(record.token0, token0);
        assert_eq!(record.token1, token1);
        assert_eq!(record.fee, None);
        assert_eq!(record.deployment_block, 100);
    }

    #[test]
    fn test_pool_deployed_with_negative_tick_spacing() {
        let mut data = Vec::new();
        data.extend_from_slice(&int_word(3000));
        data.extend_from_slice(&int_word(-60));
        let raw = log(
            vec![
                POOL_DEPLOYED.topic0(),
                H256::from(address_word(Address::repeat_byte(0xAA))),
                H256::from(address_word(Address::repeat_byte(0x01))),
                H256::from(address_word(Address::repeat_byte(0x02))),
            ],
            data,
        );

        let DomainEvent::PoolDeployed(record) = decode(&raw, &POOL_DEPLOYED).unwrap() else {
            panic!("expected a pool");
        };
        assert_eq!(record.fee, Some(3000));
        assert_eq!(record.tick_spacing, Some(-60));
    }

    #[test]
    fn test_wrong_word_count_is_malformed() {
        let raw = log(
            vec![
                SOVEREIGN_POOL_DEPLOYED.topic0(),
                H256::repeat_byte(0x01),
                H256::repeat_byte(0x02),
            ],
            vec![0u8; 31],
        );
        assert!(matches!(
            decode(&raw, &SOVEREIGN_POOL_DEPLOYED),
            Err(DecodeError::MalformedData { expected: 32, found: 31, .. })
        ));
    }

    #[test]
    fn test_missing_topics() {
        let raw = log(vec![UPGRADED.topic0()], vec![]);
        assert!(matches!(
            decode(&raw, &UPGRADED),
            Err(DecodeError::MissingTopics { expected: 2, found: 1, .. })
        ));
    }

    #[test]
    fn test_signature_mismatch() {
        let raw = log(vec![UPGRADED.topic0(), H256::zero()], vec![]);
        assert!(matches!(
            decode(&raw, &SOVEREIGN_POOL_DEPLOYED),
            Err(DecodeError::SignatureMismatch { .. })
        ));
    }

    #[test]
    fn test_uint24_out_of_range() {
        let mut word = [0u8; 32];
        word[28] = 0x01; // 2^24
        assert_eq!(decode_word(&word, FieldKind::Uint(24)), None);
        assert!(decode_word(&int_word(0xFFFFFF), FieldKind::Uint(24)).is_some());
    }

    #[test]
    fn test_int24_rejects_bad_sign_extension() {
        let mut word = int_word(-1);
        word[0] = 0x00;
        assert_eq!(decode_word(&word, FieldKind::Int(24)), None);
        assert_eq!(decode_word(&int_word(1 << 23), FieldKind::Int(24)), None);
        assert_eq!(decode_word(&int_word(-(1 << 23)), FieldKind::Int(24)), Some(DecodedValue::Int(-(1 << 23))));
    }

    #[test]
    fn test_unknown_event_is_skipped_in_batch() {
        let decoder = EventDecoder::default();
        let good = log(
            vec![UPGRADED.topic0(), H256::from(address_word(Address::repeat_byte(0x05)))],
            vec![],
        );
        let unknown = log(vec![H256::repeat_byte(0x99)], vec![]);

        let batch = decoder.decode_batch(&[unknown, good]);
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.skipped.len(), 1);
        assert!(matches!(batch.skipped[0].error, DecodeError::UnknownEvent(_)));
        assert!(batch.events[0].is_upgrade());
    }

    #[test]
    fn test_schema_lookup_by_name() {
        let decoder = EventDecoder::default();
        assert_eq!(decoder.schema("Upgraded").unwrap().kind, EventKind::Upgraded);
        assert!(matches!(decoder.schema("Swap"), Err(DecodeError::UnknownEvent(_))));
    }
}
