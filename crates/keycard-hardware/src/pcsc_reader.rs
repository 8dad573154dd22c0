//! PC/SC contactless reader support.
//!
//! Reads the UID of whatever tag sits on each attached reader with the
//! PC/SC pseudo-APDU `GET DATA` (`FF CA 00 00 00`). PC/SC calls block, so
//! every poll runs on the blocking pool.

use std::ffi::CString;

use pcsc::{Context, Protocols, Scope, ShareMode};
use tracing::{debug, info};

use crate::error::{HardwareError, Result};
use crate::traits::TagPoller;

const GET_UID_APDU: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];
const SW_SUCCESS: [u8; 2] = [0x90, 0x00];

fn pcsc_error(err: pcsc::Error) -> HardwareError {
    HardwareError::communication(format!("PC/SC: {err}"))
}

/// Tag poller over every PC/SC reader attached to the system.
#[derive(Clone)]
pub struct PcscPoller {
    context: Context,
}

impl PcscPoller {
    /// Connect to the PC/SC daemon.
    ///
    /// # Errors
    ///
    /// Returns [`HardwareError::InitializationFailed`] if the PC/SC service is
    /// not available.
    pub fn open() -> Result<Self> {
        let context = Context::establish(Scope::User).map_err(|err| {
            HardwareError::initialization_failed(format!("PC/SC context: {err}"))
        })?;
        let readers = context.list_readers_owned().unwrap_or_default();
        info!(readers = readers.len(), "PC/SC context established");
        Ok(Self { context })
    }
}

impl std::fmt::Debug for PcscPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcscPoller").finish_non_exhaustive()
    }
}

impl TagPoller for PcscPoller {
    async fn visible_tags(&mut self) -> Result<Vec<Vec<u8>>> {
        let context = self.context.clone();
        tokio::task::spawn_blocking(move || read_all(&context))
            .await
            .map_err(|err| HardwareError::communication(format!("PC/SC poll task: {err}")))?
    }
}

fn read_all(context: &Context) -> Result<Vec<Vec<u8>>> {
    let readers = match context.list_readers_owned() {
        Ok(readers) => readers,
        Err(pcsc::Error::NoReadersAvailable) => return Ok(Vec::new()),
        Err(err) => return Err(pcsc_error(err)),
    };

    let mut uids = Vec::new();
    for reader in readers {
        if let Some(uid) = read_uid(context, &reader)? {
            uids.push(uid);
        }
    }
    Ok(uids)
}

fn read_uid(context: &Context, reader: &CString) -> Result<Option<Vec<u8>>> {
    let card = match context.connect(reader, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => card,
        Err(pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard) => return Ok(None),
        Err(err) => return Err(pcsc_error(err)),
    };

    let mut buf = [0u8; pcsc::MAX_BUFFER_SIZE];
    let response = match card.transmit(&GET_UID_APDU, &mut buf) {
        Ok(response) => response,
        Err(pcsc::Error::RemovedCard) => return Ok(None),
        Err(err) => return Err(pcsc_error(err)),
    };

    let Some((uid, status)) = response.split_last_chunk::<2>() else {
        return Err(HardwareError::tag_read("short GET DATA response"));
    };
    if *status != SW_SUCCESS || uid.is_empty() {
        debug!(reader = ?reader, status = ?status, "GET DATA rejected");
        return Err(HardwareError::tag_read(format!(
            "GET DATA failed with status {:02X}{:02X}",
            status[0], status[1]
        )));
    }
    Ok(Some(uid.to_vec()))
}
