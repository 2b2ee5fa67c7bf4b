//! Telemetry subscription table.
//!
//! The table is a fixed array of [`MAX_SUBSCRIPTIONS`] slots. Scanning stops
//! at the first slot holding an invalid message id, so unused slots are
//! simply left invalid.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::Qos;
use crate::mids;
use crate::msg::MsgId;

pub const MAX_SUBSCRIPTIONS: usize = 32;
pub const DEFAULT_BUF_LIMIT: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("subscription table holds at most {max} entries, got {got}")]
    TooManyEntries { max: usize, got: usize },
    #[error("subscription table unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub msg_id: MsgId,
    #[serde(default)]
    pub qos: Qos,
    #[serde(default = "default_buf_limit")]
    pub buf_limit: u8,
}

fn default_buf_limit() -> u8 {
    DEFAULT_BUF_LIMIT
}

impl Subscription {
    pub const UNUSED: Subscription = Subscription {
        msg_id: MsgId::INVALID,
        qos: Qos {
            priority: 0,
            reliability: 0,
        },
        buf_limit: 0,
    };

    pub const fn new(msg_id: MsgId, buf_limit: u8) -> Self {
        Self {
            msg_id,
            qos: Qos {
                priority: 0,
                reliability: 0,
            },
            buf_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionTable {
    slots: [Subscription; MAX_SUBSCRIPTIONS],
}

impl SubscriptionTable {
    /// Table with every slot unused.
    pub fn empty() -> Self {
        Self {
            slots: [Subscription::UNUSED; MAX_SUBSCRIPTIONS],
        }
    }

    pub fn from_entries<I>(entries: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = Subscription>,
    {
        let mut table = Self::empty();
        let mut count = 0;
        for entry in entries {
            if let Some(slot) = table.slots.get_mut(count) {
                *slot = entry;
            }
            count += 1;
        }
        if count > MAX_SUBSCRIPTIONS {
            return Err(TableError::TooManyEntries {
                max: MAX_SUBSCRIPTIONS,
                got: count,
            });
        }
        Ok(table)
    }

    /// Raw slot access, including whatever follows the first invalid id.
    pub fn slots(&self) -> &[Subscription; MAX_SUBSCRIPTIONS] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [Subscription; MAX_SUBSCRIPTIONS] {
        &mut self.slots
    }

    /// Active entries, in table order, up to the first invalid id.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> + '_ {
        self.slots.iter().take_while(|s| s.msg_id.is_valid())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SubscriptionTable {
    /// Core service housekeeping plus this console and its companion apps.
    fn default() -> Self {
        let mut ids = heapless::Vec::<MsgId, MAX_SUBSCRIPTIONS>::new();
        let core = [
            mids::TO_HK_TLM_MID,
            mids::ES_HK_TLM_MID,
            mids::EVS_HK_TLM_MID,
            mids::SB_HK_TLM_MID,
            mids::TBL_HK_TLM_MID,
            mids::TIME_HK_TLM_MID,
            mids::TIME_DIAG_TLM_MID,
            mids::EVS_LONG_EVENT_MSG_MID,
            mids::SB_STATS_TLM_MID,
            mids::ES_APP_TLM_MID,
            mids::TBL_REG_TLM_MID,
            mids::ES_MEMSTATS_TLM_MID,
        ];
        // Cannot overflow: at most 16 ids against 32 slots
        let _ = ids.extend_from_slice(&core);
        #[cfg(feature = "mxm")]
        let _ = ids.extend_from_slice(&[mids::MXM_HK_TLM_MID, mids::MXM_RES_TLM_MID]);
        #[cfg(feature = "huff")]
        let _ = ids.extend_from_slice(&[mids::HUFF_HK_TLM_MID, mids::HUFF_RES_TLM_MID]);

        let mut table = Self::empty();
        for (slot, id) in table.slots.iter_mut().zip(ids) {
            *slot = Subscription::new(id, DEFAULT_BUF_LIMIT);
        }
        table
    }
}

/// Supplier of the subscription table, consulted once at start-up.
pub trait TableService {
    fn load_subscriptions(&mut self) -> Result<SubscriptionTable, TableError>;
}

/// Serves a table fixed at construction.
#[derive(Debug, Clone, Default)]
pub struct StaticTableService {
    table: SubscriptionTable,
}

impl StaticTableService {
    pub fn new(table: SubscriptionTable) -> Self {
        Self { table }
    }
}

impl TableService for StaticTableService {
    fn load_subscriptions(&mut self) -> Result<SubscriptionTable, TableError> {
        Ok(self.table.clone())
    }
}

/// Always fails; stands in for a missing or corrupt table image.
#[derive(Debug, Clone)]
pub struct UnavailableTable(pub String);

impl TableService for UnavailableTable {
    fn load_subscriptions(&mut self) -> Result<SubscriptionTable, TableError> {
        Err(TableError::Unavailable(self.0.clone()))
    }
}
