use crate::auth::AdminCredentials;
use crate::chat::ChatClient;
use crate::db::TableClient;
use crate::media::MediaClient;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub db: TableClient,
    pub chat: ChatClient,
    pub media: MediaClient,
    pub storage: Option<StorageClient>,
    pub admin: AdminCredentials,
}
