use ethers::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};

/// A raw event log, already normalized away from the provider's optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    pub address: Address,
    pub topics: Vec<H256>,
    pub data: Bytes,
    pub block_number: u64,
    pub log_index: u64,
    pub transaction_hash: H256,
}

impl LogEvent {
    /// Ordering key within a scan.
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

impl TryFrom<ethers::types::Log> for LogEvent {
    type Error = String;

    /// Pending logs (no block number / index / hash yet) are rejected.
    fn try_from(log: ethers::types::Log) -> std::result::Result<Self, Self::Error> {
        let block_number = log.block_number.ok_or("log without block number")?.as_u64();
        let log_index = log.log_index.ok_or("log without log index")?.as_u64();
        let transaction_hash = log.transaction_hash.ok_or("log without transaction hash")?;
        Ok(Self {
            address: log.address,
            topics: log.topics,
            data: log.data,
            block_number,
            log_index,
            transaction_hash,
        })
    }
}

/// True when events are in strictly ascending (blockNumber, logIndex) order.
pub fn is_strictly_ordered(events: &[LogEvent]) -> bool {
    events.windows(2).all(|pair| pair[0].position() < pair[1].position())
}
