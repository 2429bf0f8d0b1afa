use anyhow::Result;
use chrono::NaiveDate;
use httpmock::prelude::*;
use hubsync::aha::{AhaClient, Feature, FieldAction, FieldOutcome, Product};
use hubsync::HubError;
use serde_json::json;

fn client(server: &MockServer) -> AhaClient {
    AhaClient::new(server.base_url(), "aha-token")
}

fn mock_releases(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/products/P1/releases")
            .query_param("page", "1");
        then.status(200).json_body(json!({
            "releases": [
                {"id": "6776", "reference_num": "APP-R-1", "name": "2024.1"},
                {"id": "6777", "reference_num": "APP-R-2", "name": "2024.2"}
            ],
            "pagination": {"total_records": 2, "total_pages": 1, "current_page": 1}
        }));
    })
}

fn feature(reference_num: &str) -> Feature {
    serde_json::from_value(json!({"id": "F1", "reference_num": reference_num, "product_id": "P1"})).unwrap()
}

fn product() -> Product {
    serde_json::from_value(json!({
        "id": "P1",
        "reference_prefix": "APP",
        "screen_definitions": [{
            "screenable_type": "Feature",
            "custom_field_definitions": [
                {"key": "commit", "name": "Commitment", "type": "CustomFieldDefinitions::SelectConstant", "api_type": "string",
                 "options": [{"id": "10", "label": "Committed"}, {"id": "11", "label": "Outlook"}]},
                {"key": "ghe_url", "name": "GHE URL", "type": "CustomFieldDefinitions::UrlField", "api_type": "url"},
                {"key": "customers", "name": "Customers", "type": "CustomFieldDefinitions::LinkMany", "api_type": "array",
                 "options": [{"id": "30", "label": "Acme "}, {"id": "31", "label": "Globex"}, {"id": "32", "label": "Initech"}]}
            ]
        }]
    }))
    .unwrap()
}

/// Pages are requested until current_page reaches total_pages.
#[tokio::test]
async fn test_get_all_walks_every_page() -> Result<()> {
    let server = MockServer::start();

    let page1 = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/products/P1/features")
            .query_param("page", "1")
            .header("Authorization", "Bearer aha-token");
        then.status(200).json_body(json!({
            "features": [{"id": "1", "reference_num": "APP-1"}, {"id": "2", "reference_num": "APP-2"}],
            "pagination": {"total_records": 3, "total_pages": 2, "current_page": 1}
        }));
    });
    let page2 = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/products/P1/features")
            .query_param("page", "2");
        then.status(200).json_body(json!({
            "features": [{"id": "3", "reference_num": "APP-3"}],
            "pagination": {"total_records": 3, "total_pages": 2, "current_page": 2}
        }));
    });

    let features = client(&server).features(&product()).await?;

    page1.assert();
    page2.assert();
    let refs: Vec<&str> = features.iter().map(|f| f.reference_num.as_str()).collect();
    assert_eq!(refs, vec!["APP-1", "APP-2", "APP-3"]);
    Ok(())
}

#[tokio::test]
async fn test_get_all_without_pagination_block_is_one_page() -> Result<()> {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/products").query_param("page", "1");
        then.status(200)
            .json_body(json!({"products": [{"id": "P1", "name": "Platform"}]}));
    });

    let products = client(&server).products().await?;

    mock.assert_hits(1);
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Platform");
    Ok(())
}

#[tokio::test]
async fn test_api_error_carries_status_and_body() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/api/v1/features/APP-404");
        then.status(404).body("{\"error\":\"Record not found\"}");
    });

    let err = client(&server).feature("APP-404").await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(err.is_not_found());
    match err {
        HubError::ApiError { service, body, .. } => {
            assert_eq!(service, "Aha");
            assert!(body.contains("Record not found"));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_token_sends_nothing() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/products");
        then.status(200);
    });

    let aha = AhaClient::new(server.base_url(), "");
    let err = aha.products().await.unwrap_err();

    assert!(matches!(err, HubError::MissingToken { service: "Aha" }));
    mock.assert_hits(0);
}

#[tokio::test]
async fn test_custom_field_set_select_sends_option_id() -> Result<()> {
    let server = MockServer::start();

    let update = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v1/features/APP-7")
            .json_body(json!({"feature": {"custom_fields": {"commit": "10"}}}));
        then.status(200).json_body(json!({
            "feature": {
                "id": "F1",
                "reference_num": "APP-7",
                "custom_fields": [{"key": "commit", "name": "Commitment", "value": "Committed", "type": "string"}]
            }
        }));
    });

    let aha = client(&server);
    let mut feature: Feature = serde_json::from_value(json!({
        "id": "F1",
        "reference_num": "APP-7",
        "custom_fields": [{"key": "commit", "name": "Commitment", "value": "Outlook", "type": "string"}]
    }))?;

    let outcome = aha
        .custom_field(&product(), &mut feature, "Commitment", FieldAction::Set, "Committed")
        .await?;

    update.assert();
    assert_eq!(outcome, FieldOutcome::Updated);
    assert_eq!(feature.custom_fields[0].text(), Some("Committed"));

    // Already set: no request goes out.
    let outcome = aha
        .custom_field(&product(), &mut feature, "Commitment", FieldAction::Set, "Committed")
        .await?;
    assert_eq!(outcome, FieldOutcome::Unchanged);
    update.assert_hits(1);

    assert!(aha.has_custom_field_value(&product(), &feature, "commit", "Committed")?);
    Ok(())
}

#[tokio::test]
async fn test_create_release_if_needed() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/api/v1/products/P1/releases");
        then.status(200).json_body(json!({
            "releases": [{"id": "R1", "reference_num": "APP-R-1", "name": "2024.1"}],
            "pagination": {"total_records": 1, "total_pages": 1, "current_page": 1}
        }));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/products/P1/releases")
            .json_body(json!({"release": {"name": "2024.2", "release_date": "2024-06-30"}}));
        then.status(200).json_body(json!({
            "release": {"id": "R2", "reference_num": "APP-R-2", "name": "2024.2", "release_date": "2024-06-30"}
        }));
    });

    let aha = client(&server);
    let date = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();

    let existing = aha.create_release_if_needed(&product(), "2024.1", date).await?;
    assert_eq!(existing.id, "R1");
    create.assert_hits(0);

    let created = aha.create_release_if_needed(&product(), "2024.2", date).await?;
    assert_eq!(created.reference_num, "APP-R-2");
    create.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_create_feature_in_named_release() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/api/v1/products/P1/releases");
        then.status(200)
            .json_body(json!({"releases": [{"id": "R1", "reference_num": "APP-R-1", "name": "Backlog"}]}));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/releases/APP-R-1/features")
            .body_contains("\"name\":\"Dark mode\"");
        then.status(200)
            .json_body(json!({"feature": {"id": "F9", "reference_num": "APP-9", "name": "Dark mode"}}));
    });

    let aha = client(&server);
    let feature = aha
        .create_feature(&product(), "Dark mode", "Backlog", "Please")
        .await?;
    create.assert();
    assert_eq!(feature.reference_num, "APP-9");

    let err = aha
        .create_feature(&product(), "Dark mode", "Nope", "")
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NotFound { what: "Aha release", .. }));
    Ok(())
}

#[tokio::test]
async fn test_delete_feature_treats_404_as_deleted() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(DELETE).path("/api/v1/features/APP-1");
        then.status(204);
    });
    server.mock(|when, then| {
        when.method(DELETE).path("/api/v1/features/APP-2");
        then.status(404);
    });
    server.mock(|when, then| {
        when.method(DELETE).path("/api/v1/features/APP-3");
        then.status(500).body("boom");
    });

    let aha = client(&server);
    assert!(aha.delete_feature("APP-1").await?);
    assert!(aha.delete_feature("APP-2").await?);
    assert_eq!(aha.delete_feature("APP-3").await.unwrap_err().status(), Some(500));
    Ok(())
}

#[tokio::test]
async fn test_tag_updates_skip_no_ops() -> Result<()> {
    let server = MockServer::start();

    let update = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v1/features/APP-5")
            .json_body(json!({"feature": {"tags": ["ui", "beta"]}}));
        then.status(200)
            .json_body(json!({"feature": {"id": "F5", "reference_num": "APP-5", "tags": ["ui", "beta"]}}));
    });

    let aha = client(&server);
    let mut feature: Feature = serde_json::from_value(json!({"id": "F5", "reference_num": "APP-5", "tags": ["ui"]}))?;

    aha.add_feature_tag(&mut feature, "ui").await?;
    update.assert_hits(0);

    aha.add_feature_tag(&mut feature, "beta").await?;
    update.assert_hits(1);
    assert!(feature.has_tag("beta"));

    aha.remove_feature_tag(&mut feature, "missing").await?;
    update.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_feature_updates_send_expected_bodies() -> Result<()> {
    let server = MockServer::start();
    mock_releases(&server);

    let due = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v1/features/APP-7")
            .json_body(json!({"feature": {"due_date": "2024-03-09"}}));
        then.status(200)
            .json_body(json!({"feature": {"id": "F1", "reference_num": "APP-7", "due_date": "2024-03-09"}}));
    });
    let release = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v1/features/APP-7")
            .json_body(json!({"feature": {"release": "APP-R-2"}}));
        then.status(200).json_body(json!({
            "feature": {"id": "F1", "reference_num": "APP-7", "release": {"id": "6777", "reference_num": "APP-R-2", "name": "2024.2"}}
        }));
    });
    let git_url = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v1/features/APP-7")
            .json_body(json!({"feature": {"custom_fields": {"ghe_url": "https://github.acme.com/acme/api/issues/7"}}}));
        then.status(200).json_body(json!({
            "feature": {
                "id": "F1",
                "reference_num": "APP-7",
                "custom_fields": [{"key": "ghe_url", "name": "GHE URL", "value": "https://github.acme.com/acme/api/issues/7", "type": "url"}]
            }
        }));
    });

    let aha = client(&server);
    let mut feature = feature("APP-7");

    aha.set_feature_due_date(&mut feature, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
        .await?;
    due.assert();
    assert_eq!(feature.due_date.as_deref(), Some("2024-03-09"));

    aha.set_feature_release_by_name(&product(), &mut feature, "2024.2")
        .await?;
    release.assert();
    assert_eq!(feature.release.as_ref().map(|r| r.name.as_str()), Some("2024.2"));

    let err = aha
        .set_feature_release_by_name(&product(), &mut feature, "2099.9")
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::NotFound { what: "Aha release", .. }));
    release.assert_hits(1);

    aha.set_feature_git_url(&mut feature, "https://github.acme.com/acme/api/issues/7")
        .await?;
    git_url.assert();
    assert_eq!(feature.git_url(), Some("https://github.acme.com/acme/api/issues/7"));
    Ok(())
}

#[tokio::test]
async fn test_features_by_release_name() -> Result<()> {
    let server = MockServer::start();
    mock_releases(&server);

    let features = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/releases/6776/features")
            .query_param("fields", "*")
            .query_param("page", "1");
        then.status(200).json_body(json!({
            "features": [{"id": "1", "reference_num": "APP-1"}, {"id": "2", "reference_num": "APP-2"}],
            "pagination": {"total_records": 2, "total_pages": 1, "current_page": 1}
        }));
    });

    let aha = client(&server);
    let found = aha.features_by_release_name(&product(), "2024.1").await?;

    features.assert();
    let refs: Vec<&str> = found.iter().map(|f| f.reference_num.as_str()).collect();
    assert_eq!(refs, vec!["APP-1", "APP-2"]);

    let err = aha
        .features_by_release_name(&product(), "Someday")
        .await
        .unwrap_err();
    match err {
        HubError::NotFound { what, name } => {
            assert_eq!(what, "Aha release");
            assert_eq!(name, "Someday");
        }
        other => panic!("unexpected error {:?}", other),
    }
    features.assert_hits(1);
    Ok(())
}

#[tokio::test]
async fn test_refresh_feature_and_custom_object_record() -> Result<()> {
    let server = MockServer::start();

    let refresh = server.mock(|when, then| {
        when.method(GET).path("/api/v1/features/F1");
        then.status(200).json_body(json!({
            "feature": {"id": "F1", "reference_num": "APP-7", "name": "Renamed upstream", "tags": ["ui"]}
        }));
    });
    let record = server.mock(|when, then| {
        when.method(GET)
            .path("/api/v1/custom_object_records/6790")
            .header("Authorization", "Bearer aha-token");
        then.status(200).json_body(json!({
            "custom_object_record": {
                "id": "6790",
                "product_id": "P1",
                "key": "customers",
                "custom_fields": [{"key": "tier", "name": "Tier", "value": "Gold", "type": "string"}],
                "custom_object_links": [{"key": "contacts", "record_ids": ["7001"]}]
            }
        }));
    });

    let aha = client(&server);
    let mut feature = feature("APP-7");

    aha.refresh_feature(&mut feature).await?;
    refresh.assert();
    assert_eq!(feature.name, "Renamed upstream");
    assert!(feature.has_tag("ui"));

    let found = aha.custom_object_record("6790").await?;
    record.assert();
    assert_eq!(found.key, "customers");
    assert_eq!(found.custom_fields[0].text(), Some("Gold"));
    assert_eq!(found.custom_object_links[0].record_ids, vec!["7001"]);
    Ok(())
}

#[tokio::test]
async fn test_custom_field_link_many_set_and_clear() -> Result<()> {
    let server = MockServer::start();

    let add = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v1/features/APP-8")
            .json_body(json!({"feature": {"custom_object_links": {"customers": ["31", "30"]}}}));
        then.status(200).json_body(json!({
            "feature": {
                "id": "F8",
                "reference_num": "APP-8",
                "custom_object_links": [{"key": "customers", "record_ids": ["31", "30"]}]
            }
        }));
    });
    let clear = server.mock(|when, then| {
        when.method(PUT)
            .path("/api/v1/features/APP-8")
            .json_body(json!({"feature": {"custom_object_links": {"customers": [""]}}}));
        then.status(200).json_body(json!({
            "feature": {
                "id": "F8",
                "reference_num": "APP-8",
                "custom_object_links": [{"key": "customers", "record_ids": []}]
            }
        }));
    });

    let aha = client(&server);
    let mut feature: Feature = serde_json::from_value(json!({
        "id": "F8",
        "reference_num": "APP-8",
        "custom_object_links": [{"key": "customers", "record_ids": ["31"]}]
    }))?;

    let outcome = aha
        .custom_field(&product(), &mut feature, "Customers", FieldAction::Set, "Acme")
        .await?;
    add.assert();
    assert_eq!(outcome, FieldOutcome::Updated);
    assert_eq!(feature.custom_object_links[0].record_ids, vec!["31", "30"]);

    let names = aha
        .custom_field(&product(), &mut feature, "Customers", FieldAction::Get, "")
        .await?;
    assert_eq!(names, FieldOutcome::Value("Acme,Globex".to_string()));

    let outcome = aha
        .custom_field(&product(), &mut feature, "Customers", FieldAction::Remove, "")
        .await?;
    clear.assert();
    assert_eq!(outcome, FieldOutcome::Updated);
    assert!(feature.custom_object_links[0].record_ids.is_empty());

    // Nothing linked any more: a second clear sends nothing.
    let outcome = aha
        .custom_field(&product(), &mut feature, "Customers", FieldAction::Remove, "")
        .await?;
    assert_eq!(outcome, FieldOutcome::Unchanged);
    clear.assert_hits(1);

    let err = aha
        .custom_field(&product(), &mut feature, "Customers", FieldAction::Set, "Umbrella")
        .await
        .unwrap_err();
    assert!(matches!(err, HubError::InvalidOption { .. }));
    Ok(())
}
