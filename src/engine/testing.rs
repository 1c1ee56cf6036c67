//! In-memory `ResourceApi` for engine tests

use super::api::{DesiredState, Detail, Page, PageMarker, ResourceApi, Summary};
use super::error::ApiError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub list: usize,
    pub get: usize,
    pub get_by_key: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

pub struct MockApi {
    objects: Mutex<Vec<Detail>>,
    calls: Mutex<Calls>,
    page_size: usize,
    key_lookup: bool,
    fail_mutations: bool,
    /// First page whose listing fails
    fail_list_from: Option<usize>,
}

impl MockApi {
    /// Objects `id-1..=id-n` named `device-1..=device-n`
    pub fn with_devices(n: usize) -> Self {
        let objects = (1..=n)
            .map(|i| {
                Detail::from_value(json!({
                    "id": format!("id-{}", i),
                    "name": format!("device-{}", i),
                    "description": "lab switch"
                }))
                .unwrap()
            })
            .collect();

        Self {
            objects: Mutex::new(objects),
            calls: Mutex::new(Calls::default()),
            page_size: 2,
            key_lookup: false,
            fail_mutations: false,
            fail_list_from: None,
        }
    }

    pub fn with_key_lookup(mut self) -> Self {
        self.key_lookup = true;
        self
    }

    pub fn failing_mutations(mut self) -> Self {
        self.fail_mutations = true;
        self
    }

    pub fn failing_list_from(mut self, page: usize) -> Self {
        self.fail_list_from = Some(page);
        self
    }

    pub fn calls(&self) -> Calls {
        *self.calls.lock().unwrap()
    }

    pub fn object(&self, id: &str) -> Option<Detail> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.field_str("id").as_deref() == Some(id))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    fn server_error() -> ApiError {
        ApiError::Status {
            status: 500,
            message: "Internal Server Error".to_string(),
            body: r#"{"error":"mock failure"}"#.to_string(),
        }
    }
}

#[async_trait]
impl ResourceApi for MockApi {
    async fn list_page(&self, marker: Option<&PageMarker>) -> Result<Page, ApiError> {
        self.calls.lock().unwrap().list += 1;
        let page = marker.map(|m| m.page as usize).unwrap_or(1);
        if self.fail_list_from.is_some_and(|from| page >= from) {
            return Err(Self::server_error());
        }
        let objects = self.objects.lock().unwrap();

        let start = (page - 1) * self.page_size;
        let entries: Vec<Summary> = objects
            .iter()
            .skip(start)
            .take(self.page_size)
            .map(|d| Summary {
                id: d.field_str("id").unwrap_or_default(),
                key: d.field_str("name"),
                raw: Value::Null,
            })
            .collect();

        let next = (start + self.page_size < objects.len()).then(|| PageMarker {
            page: page as u32 + 1,
            size: self.page_size as u32,
        });

        Ok(Page { entries, next })
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Detail>, ApiError> {
        self.calls.lock().unwrap().get += 1;
        Ok(self.object(id))
    }

    fn supports_key_lookup(&self) -> bool {
        self.key_lookup
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<Detail>, ApiError> {
        self.calls.lock().unwrap().get_by_key += 1;
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.field_str("name").as_deref() == Some(key))
            .cloned())
    }

    async fn create(&self, desired: &DesiredState) -> Result<Detail, ApiError> {
        self.calls.lock().unwrap().create += 1;
        if self.fail_mutations {
            return Err(Self::server_error());
        }

        let mut objects = self.objects.lock().unwrap();
        let mut fields = desired.clone();
        fields.insert("id".to_string(), json!(format!("new-{}", objects.len() + 1)));
        let detail = Detail::new(fields);
        objects.push(detail.clone());
        Ok(detail)
    }

    async fn update_by_id(
        &self,
        id: &str,
        desired: &DesiredState,
    ) -> Result<Option<Detail>, ApiError> {
        self.calls.lock().unwrap().update += 1;
        if self.fail_mutations {
            return Err(Self::server_error());
        }

        let mut objects = self.objects.lock().unwrap();
        let Some(slot) = objects
            .iter_mut()
            .find(|d| d.field_str("id").as_deref() == Some(id))
        else {
            return Err(ApiError::NotFound);
        };

        let mut fields = slot.fields().clone();
        for (name, value) in desired {
            fields.insert(name.clone(), value.clone());
        }
        *slot = Detail::new(fields);
        Ok(None)
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().delete += 1;
        if self.fail_mutations {
            return Err(Self::server_error());
        }

        let mut objects = self.objects.lock().unwrap();
        let before = objects.len();
        objects.retain(|d| d.field_str("id").as_deref() != Some(id));
        if objects.len() == before {
            return Err(ApiError::NotFound);
        }
        Ok(())
    }
}
