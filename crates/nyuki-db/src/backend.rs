//! Collection, counter and change-feed traits over the repos.

use async_trait::async_trait;
use nyuki_core::entities::{Apiary, Hive, NewApiary, NewHive};
use nyuki_core::errors::BackendError;
use nyuki_core::updates::apiary::ApiaryPatch;
use nyuki_core::updates::hive::HivePatch;
use nyuki_sync::{
    ChangeFeed, CollectionBackend, CounterBackend, FeedHandle, FeedId, Removal, Revision,
};

use crate::service::NyukiService;

#[async_trait]
impl CollectionBackend<Apiary> for NyukiService {
    async fn list(&self, owner_id: &str) -> Result<Vec<Apiary>, BackendError> {
        Ok(self.list_apiaries(owner_id).await?)
    }

    async fn create(
        &self,
        owner_id: &str,
        draft: &NewApiary,
        client_ref: &str,
    ) -> Result<Apiary, BackendError> {
        Ok(self.create_apiary(owner_id, draft, client_ref).await?)
    }

    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: &ApiaryPatch,
    ) -> Result<Revision<Apiary>, BackendError> {
        Ok(self.update_apiary(owner_id, id, patch).await?)
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<Removal<Apiary>, BackendError> {
        Ok(self.delete_apiary(owner_id, id).await?)
    }
}

#[async_trait]
impl CollectionBackend<Hive> for NyukiService {
    async fn list(&self, owner_id: &str) -> Result<Vec<Hive>, BackendError> {
        Ok(self.list_hives(owner_id).await?)
    }

    async fn create(
        &self,
        owner_id: &str,
        draft: &NewHive,
        client_ref: &str,
    ) -> Result<Hive, BackendError> {
        Ok(self.create_hive(owner_id, draft, client_ref).await?)
    }

    async fn update(
        &self,
        owner_id: &str,
        id: &str,
        patch: &HivePatch,
    ) -> Result<Revision<Hive>, BackendError> {
        Ok(self.update_hive(owner_id, id, patch).await?)
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<Removal<Hive>, BackendError> {
        Ok(self.delete_hive(owner_id, id).await?)
    }
}

#[async_trait]
impl CounterBackend for NyukiService {
    async fn increment_hive_count(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, BackendError> {
        Ok(self.adjust_hive_count(owner_id, apiary_id, 1).await?)
    }

    async fn decrement_hive_count(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, BackendError> {
        Ok(self.adjust_hive_count(owner_id, apiary_id, -1).await?)
    }

    async fn recount_hives(
        &self,
        owner_id: &str,
        apiary_id: &str,
    ) -> Result<Apiary, BackendError> {
        Ok(self.recount_hives(owner_id, apiary_id).await?)
    }
}

#[async_trait]
impl ChangeFeed<Apiary> for NyukiService {
    async fn subscribe(&self, owner_id: &str) -> Result<FeedHandle<Apiary>, BackendError> {
        Ok(self.apiary_feed().subscribe(owner_id))
    }

    fn unsubscribe(&self, id: FeedId) {
        self.apiary_feed().unsubscribe(id);
    }
}

#[async_trait]
impl ChangeFeed<Hive> for NyukiService {
    async fn subscribe(&self, owner_id: &str) -> Result<FeedHandle<Hive>, BackendError> {
        Ok(self.hive_feed().subscribe(owner_id))
    }

    fn unsubscribe(&self, id: FeedId) {
        self.hive_feed().unsubscribe(id);
    }
}
