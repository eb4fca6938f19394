use {
    anyhow::{Context as _, Result},
    base64::{Engine as _, engine::general_purpose::STANDARD},
    stash_protocol::{
        StashId,
        endpoints::{CopyRequest, PasteRequest},
    },
    stash_sdk::storage::FilesystemStore,
    std::sync::Arc,
    tokio::task::block_in_place,
    tracing::info,
};

#[derive(Debug, Clone)]
pub struct Context {
    pub storage: Arc<FilesystemStore>,
}

pub async fn copy(ctx: Context, request: CopyRequest) -> Result<StashId> {
    let data = STANDARD
        .decode(&request.payload)
        .context("invalid base64 payload")?;
    let id = block_in_place(|| ctx.storage.store(&data))?;
    info!("stored {id} ({} bytes)", data.len());
    Ok(id)
}

pub async fn paste(ctx: Context, request: PasteRequest) -> Result<String> {
    let data = block_in_place(|| ctx.storage.load(&request.id))?;
    info!("loaded {} ({} bytes)", request.id, data.len());
    Ok(STANDARD.encode(data))
}
