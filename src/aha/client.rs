use crate::aha::custom_field::{self, FieldAction, FieldOutcome, FieldPlan};
use crate::aha::model::{CustomObjectRecord, Feature, Product, Release};
use crate::core::http::require_token;
use crate::core::{execute, split_envelope, unwrap_envelope, ApiResponse};
use crate::utils::error::{HubError, Result};
use chrono::NaiveDate;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use url::Url;

const SERVICE: &str = "Aha";

/// Client for the Aha! REST API (`https://<account>.aha.io/api/v1`).
#[derive(Debug, Clone)]
pub struct AhaClient {
    url: String,
    token: String,
    client: Client,
}

impl AhaClient {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        let url: String = url.into();
        Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.into(),
            client: Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn endpoint(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.url, path)
        }
    }

    /// Sends one request with bearer auth. Non-2xx statuses become errors.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<ApiResponse> {
        require_token(SERVICE, &self.token)?;

        let mut builder = self
            .client
            .request(method, self.endpoint(path))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        execute(&self.client, SERVICE, builder.build()?).await
    }

    /// Fetches every page of a list endpoint, walking `page=1..total_pages`.
    pub async fn get_all<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let base = Url::parse(&self.endpoint(path))?;
        let mut items = Vec::new();
        let mut page: u64 = 1;

        loop {
            let mut url = base.clone();
            url.query_pairs_mut().append_pair("page", &page.to_string());

            let response = self.request(Method::GET, url.as_str(), None).await?;
            let (info, payload) = split_envelope(&response.body)?;
            if !payload.is_null() {
                let batch: Vec<T> = serde_json::from_value(payload)?;
                items.extend(batch);
            }

            match info {
                Some(info) if info.has_next() => page = info.current_page.max(page) + 1,
                _ => break,
            }
        }

        tracing::debug!("Aha: {} items from {}", items.len(), path);
        Ok(items)
    }

    async fn get_one<T: DeserializeOwned>(&self, path: &str, key: &str) -> Result<T> {
        let response = self.request(Method::GET, path, None).await?;
        unwrap_envelope(&response.body, key)
    }

    pub async fn products(&self) -> Result<Vec<Product>> {
        self.get_all("/api/v1/products?fields=*").await
    }

    pub async fn product(&self, id: &str) -> Result<Product> {
        self.get_one(&format!("/api/v1/products/{}", id), "product").await
    }

    pub async fn features(&self, product: &Product) -> Result<Vec<Feature>> {
        self.get_all(&format!("/api/v1/products/{}/features?fields=*", product.id))
            .await
    }

    pub async fn features_by_release_name(&self, product: &Product, name: &str) -> Result<Vec<Feature>> {
        let release = self.require_release(product, name).await?;
        self.get_all(&format!("/api/v1/releases/{}/features?fields=*", release.id))
            .await
    }

    pub async fn feature(&self, id: &str) -> Result<Feature> {
        self.get_one(&format!("/api/v1/features/{}", id), "feature").await
    }

    pub async fn create_feature(
        &self,
        product: &Product,
        title: &str,
        release_name: &str,
        description: &str,
    ) -> Result<Feature> {
        let release = self.require_release(product, release_name).await?;
        let body = json!({
            "feature": {
                "name": title,
                "description": description,
                "workflow_kind": "new",
                "workflow_status": {"name": "Under consideration"}
            }
        });

        let response = self
            .request(
                Method::POST,
                &format!("/api/v1/releases/{}/features", release.reference_num),
                Some(&body),
            )
            .await?;
        let feature: Feature = unwrap_envelope(&response.body, "feature")?;
        tracing::info!("Created Aha feature {} in {}", feature.reference_num, release_name);
        Ok(feature)
    }

    pub async fn refresh_feature(&self, feature: &mut Feature) -> Result<()> {
        *feature = self.feature(&feature.id).await?;
        Ok(())
    }

    /// Deletes a feature. A feature that is already gone counts as deleted.
    pub async fn delete_feature(&self, reference: &str) -> Result<bool> {
        match self
            .request(Method::DELETE, &format!("/api/v1/features/{}", reference), None)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.status() == Some(404) => Ok(true),
            Err(e) => Err(e),
        }
    }

    /// PUTs `body` and replaces `feature` with the updated copy.
    async fn update_feature(&self, feature: &mut Feature, body: &Value) -> Result<()> {
        let response = self
            .request(
                Method::PUT,
                &format!("/api/v1/features/{}", feature.reference_num),
                Some(body),
            )
            .await?;
        *feature = unwrap_envelope(&response.body, "feature")?;
        Ok(())
    }

    pub async fn set_feature_release_by_id(&self, feature: &mut Feature, release: &str) -> Result<()> {
        self.update_feature(feature, &json!({"feature": {"release": release}}))
            .await
    }

    pub async fn set_feature_release_by_name(
        &self,
        product: &Product,
        feature: &mut Feature,
        name: &str,
    ) -> Result<()> {
        let release = self.require_release(product, name).await?;
        self.set_feature_release_by_id(feature, &release.reference_num)
            .await
    }

    pub async fn set_feature_name(&self, feature: &mut Feature, name: &str) -> Result<()> {
        self.update_feature(feature, &json!({"feature": {"name": name}}))
            .await
    }

    pub async fn set_feature_status(&self, feature: &mut Feature, status: &str) -> Result<()> {
        self.update_feature(
            feature,
            &json!({"feature": {"workflow_status": {"name": status}}}),
        )
        .await
    }

    pub async fn set_feature_due_date(&self, feature: &mut Feature, date: NaiveDate) -> Result<()> {
        let date = date.format("%Y-%m-%d").to_string();
        self.update_feature(feature, &json!({"feature": {"due_date": date}}))
            .await
    }

    pub async fn set_feature_git_url(&self, feature: &mut Feature, url: &str) -> Result<()> {
        self.update_feature(
            feature,
            &json!({"feature": {"custom_fields": {"ghe_url": url}}}),
        )
        .await
    }

    pub async fn add_feature_tag(&self, feature: &mut Feature, tag: &str) -> Result<()> {
        if feature.has_tag(tag) {
            return Ok(());
        }
        let mut tags = feature.tags.clone();
        tags.push(tag.to_string());
        self.update_feature(feature, &json!({"feature": {"tags": tags}}))
            .await
    }

    pub async fn remove_feature_tag(&self, feature: &mut Feature, tag: &str) -> Result<()> {
        if !feature.has_tag(tag) {
            return Ok(());
        }
        let tags: Vec<&String> = feature.tags.iter().filter(|t| *t != tag).collect();
        let body = json!({"feature": {"tags": tags}});
        self.update_feature(feature, &body).await
    }

    pub async fn releases(&self, product: &Product) -> Result<Vec<Release>> {
        self.get_all(&format!("/api/v1/products/{}/releases?fields=*", product.id))
            .await
    }

    pub async fn release(&self, id: &str) -> Result<Release> {
        self.get_one(&format!("/api/v1/releases/{}", id), "release").await
    }

    pub async fn release_by_name(&self, product: &Product, name: &str) -> Result<Option<Release>> {
        let releases = self.releases(product).await?;
        Ok(releases.into_iter().find(|r| r.name == name))
    }

    async fn require_release(&self, product: &Product, name: &str) -> Result<Release> {
        self.release_by_name(product, name)
            .await?
            .ok_or_else(|| HubError::NotFound {
                what: "Aha release",
                name: name.to_string(),
            })
    }

    pub async fn create_release(&self, product: &Product, name: &str, date: NaiveDate) -> Result<Release> {
        let release = Release {
            name: name.to_string(),
            release_date: Some(date.format("%Y-%m-%d").to_string()),
            ..Default::default()
        };
        let response = self
            .request(
                Method::POST,
                &format!("/api/v1/products/{}/releases", product.id),
                Some(&json!({ "release": release })),
            )
            .await?;
        unwrap_envelope(&response.body, "release")
    }

    /// Returns the release called `name`, creating it first if needed.
    pub async fn create_release_if_needed(
        &self,
        product: &Product,
        name: &str,
        date: NaiveDate,
    ) -> Result<Release> {
        if let Some(release) = self.release_by_name(product, name).await? {
            return Ok(release);
        }
        self.create_release(product, name, date).await
    }

    pub async fn custom_object_record(&self, id: &str) -> Result<CustomObjectRecord> {
        self.get_one(
            &format!("/api/v1/custom_object_records/{}", id),
            "custom_object_record",
        )
        .await
    }

    /// Runs a custom field action against `feature`, using `product`'s screen
    /// definitions to resolve the field. Updates are sent immediately and the
    /// feature is replaced by the vendor's copy.
    pub async fn custom_field(
        &self,
        product: &Product,
        feature: &mut Feature,
        name: &str,
        action: FieldAction,
        value: &str,
    ) -> Result<FieldOutcome> {
        match custom_field::plan(product, feature, name, action, value)? {
            FieldPlan::Value(v) => Ok(FieldOutcome::Value(v)),
            FieldPlan::Matches(m) => Ok(FieldOutcome::Matches(m)),
            FieldPlan::Unchanged => Ok(FieldOutcome::Unchanged),
            FieldPlan::Update(body) => {
                tracing::debug!("{}: updating field {:?}", feature.reference_num, name);
                self.update_feature(feature, &body).await?;
                Ok(FieldOutcome::Updated)
            }
        }
    }

    pub fn has_custom_field_value(
        &self,
        product: &Product,
        feature: &Feature,
        name: &str,
        value: &str,
    ) -> Result<bool> {
        match custom_field::plan(product, feature, name, FieldAction::Compare, value)? {
            FieldPlan::Matches(m) => Ok(m),
            _ => Ok(false),
        }
    }

    pub async fn add_custom_field_value(
        &self,
        product: &Product,
        feature: &mut Feature,
        name: &str,
        value: &str,
    ) -> Result<()> {
        self.custom_field(product, feature, name, FieldAction::Set, value)
            .await
            .map(|_| ())
    }

    pub async fn remove_custom_field_value(
        &self,
        product: &Product,
        feature: &mut Feature,
        name: &str,
        value: &str,
    ) -> Result<()> {
        self.custom_field(product, feature, name, FieldAction::Remove, value)
            .await
            .map(|_| ())
    }
}
