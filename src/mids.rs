//! Message identifiers known to the console.

use crate::msg::MsgId;

// Console commands and housekeeping
pub const TO_CMD_MID: MsgId = MsgId::new(0x1880);
pub const TO_SEND_HK_MID: MsgId = MsgId::new(0x1881);
pub const TO_HK_TLM_MID: MsgId = MsgId::new(0x0880);

// Core services telemetry
pub const ES_HK_TLM_MID: MsgId = MsgId::new(0x0800);
pub const EVS_HK_TLM_MID: MsgId = MsgId::new(0x0801);
pub const SB_HK_TLM_MID: MsgId = MsgId::new(0x0803);
pub const TBL_HK_TLM_MID: MsgId = MsgId::new(0x0804);
pub const TIME_HK_TLM_MID: MsgId = MsgId::new(0x0805);
pub const TIME_DIAG_TLM_MID: MsgId = MsgId::new(0x0806);
pub const EVS_LONG_EVENT_MSG_MID: MsgId = MsgId::new(0x0808);
pub const SB_STATS_TLM_MID: MsgId = MsgId::new(0x080A);
pub const ES_APP_TLM_MID: MsgId = MsgId::new(0x080B);
pub const TBL_REG_TLM_MID: MsgId = MsgId::new(0x080C);
pub const ES_MEMSTATS_TLM_MID: MsgId = MsgId::new(0x0810);

#[cfg(feature = "mxm")]
pub const MXM_HK_TLM_MID: MsgId = MsgId::new(0x0890);
#[cfg(feature = "mxm")]
pub const MXM_RES_TLM_MID: MsgId = MsgId::new(0x0891);

#[cfg(feature = "huff")]
pub const HUFF_HK_TLM_MID: MsgId = MsgId::new(0x0892);
#[cfg(feature = "huff")]
pub const HUFF_RES_TLM_MID: MsgId = MsgId::new(0x0893);
