// Copyright © 2025 mailsift.com
// Licensed under MailSift License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

use std::sync::{Arc, LazyLock};

use native_db::{Database, Models};
use tracing::debug;

use crate::modules::database::{async_find_impl, count_impl, upsert_impl, ModelsAdapter};
use crate::modules::error::MailSiftResult;
use crate::modules::sink::{IndexedDocument, IndexingSink};

pub static INDEX_MODELS: LazyLock<Models> = LazyLock::new(|| {
    let mut adapter = ModelsAdapter::new();
    adapter.register_model::<IndexedDocument>();
    adapter.models
});

/// Keeps accepted documents in the local index database.
#[derive(Clone)]
pub struct LocalIndexSink {
    db: Arc<Database<'static>>,
}

impl LocalIndexSink {
    pub fn new(db: Arc<Database<'static>>) -> Self {
        Self { db }
    }

    pub async fn get(&self, id: &str) -> MailSiftResult<Option<IndexedDocument>> {
        async_find_impl(&self.db, id.to_string()).await
    }

    pub async fn count(&self) -> MailSiftResult<u64> {
        count_impl::<IndexedDocument>(&self.db).await
    }
}

impl IndexingSink for LocalIndexSink {
    async fn submit(&self, document: IndexedDocument) -> MailSiftResult<()> {
        debug!("Indexing '{}' locally", document.id);
        upsert_impl(&self.db, document).await
    }
}
