use serde_json::json;
use stagehand_server::originals::OriginalImageRepository;
use uuid::Uuid;

use crate::common::{ADMIN_TOKEN, StagedRow, TestApp, routes};

mod images {
    use super::*;

    #[tokio::test]
    async fn upload_returns_queued_image() {
        let app = TestApp::spawn().await;

        let res = app.upload(5, "front.jpg", b"front elevation").await;

        assert_eq!(res.status, 201, "Upload failed: {}", res.text);
        assert_eq!(res.body["image"]["project_id"], 5);
        assert_eq!(res.body["image"]["status"], "queued");
        assert_eq!(res.body["reference_count"], 1);
        assert_eq!(res.body["deduplicated"], false);
        assert_eq!(res.body["content_hash"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn duplicate_upload_is_deduplicated() {
        let app = TestApp::spawn().await;

        app.upload(1, "a.jpg", b"same photo").await;
        let res = app.upload(2, "b.jpg", b"same photo").await;

        assert_eq!(res.status, 201);
        assert_eq!(res.body["deduplicated"], true);
        assert_eq!(res.body["reference_count"], 2);
        assert_eq!(app.ctx.store.put_count(), 1);
    }

    #[tokio::test]
    async fn upload_records_dimensions() {
        let app = TestApp::spawn().await;

        let res = app.upload(1, "wide.jpg", b"wide shot").await;
        let original_id: Uuid = res.body["image"]["original_image_id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        let original = app.ctx.original(original_id).await.unwrap();
        assert_eq!(original.width, Some(1920));
        assert_eq!(original.height, Some(1080));
        assert_eq!(original.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let app = TestApp::spawn().await;

        let form = reqwest::multipart::Form::new().text("width", "10");
        let res = app
            .client
            .post(format!("http://{}{}", app.addr, routes::project_images(1)))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(res.status().as_u16(), 400);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn delete_reports_original_removal() {
        let app = TestApp::spawn().await;
        let first = app.upload(1, "a.jpg", b"shared").await;
        let second = app.upload(2, "b.jpg", b"shared").await;
        let first_id = first.body["image"]["id"].as_i64().unwrap() as i32;
        let second_id = second.body["image"]["id"].as_i64().unwrap() as i32;

        let res = app.delete(&routes::image(first_id)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["original_deleted"], false);

        let res = app.delete(&routes::image(second_id)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["original_deleted"], true);
        assert_eq!(app.ctx.store.len(), 0);
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let app = TestApp::spawn().await;
        let res = app.upload(1, "a.jpg", b"twice").await;
        let id = res.body["image"]["id"].as_i64().unwrap() as i32;

        app.delete(&routes::image(id)).await;
        let res = app.delete(&routes::image(id)).await;

        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod admin {
    use super::*;

    #[tokio::test]
    async fn requires_admin_token() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::ORIGINAL_STATS).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");

        let res = app.get_with_token(routes::ORIGINAL_STATS, "wrong").await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_INVALID");
    }

    #[tokio::test]
    async fn stats_reflect_uploads() {
        let app = TestApp::spawn().await;
        app.upload(1, "a.jpg", b"aaaa").await;
        app.upload(2, "b.jpg", b"aaaa").await;
        app.upload(3, "c.jpg", b"cc").await;

        let res = app.get_with_token(routes::ORIGINAL_STATS, ADMIN_TOKEN).await;

        assert_eq!(res.status, 200, "Stats failed: {}", res.text);
        assert_eq!(res.body["total_count"], 2);
        assert_eq!(res.body["total_size"], 6);
        assert_eq!(res.body["orphaned_count"], 0);
        assert_eq!(res.body["avg_references"], 1.5);
    }

    #[tokio::test]
    async fn orphan_cleanup_uses_requested_grace_period() {
        let app = TestApp::spawn().await;
        let res = app.upload(1, "a.jpg", b"orphan").await;
        let original_id: Uuid = res.body["image"]["original_image_id"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();
        OriginalImageRepository::new(&app.ctx.db)
            .decrement_reference(original_id)
            .await
            .unwrap();
        app.ctx
            .age_original(original_id, chrono::Duration::hours(2))
            .await;

        let res = app
            .post_with_token(routes::ORIGINAL_CLEANUP, &json!({}), ADMIN_TOKEN)
            .await;
        assert_eq!(res.status, 200, "Cleanup failed: {}", res.text);
        assert_eq!(res.body["deleted"], 0);

        let res = app
            .post_with_token(
                routes::ORIGINAL_CLEANUP,
                &json!({ "grace_period_secs": 3600 }),
                ADMIN_TOKEN,
            )
            .await;
        assert_eq!(res.body["deleted"], 1);
        assert!(app.ctx.original(original_id).await.is_none());
    }

    #[tokio::test]
    async fn reconcile_dry_run_reports_drift() {
        let app = TestApp::spawn().await;
        let row = app
            .ctx
            .insert_staged(StagedRow {
                stored_present: false,
                ..StagedRow::healthy(1, "originals/zz/1", "staged/z1.jpg")
            })
            .await;

        let res = app
            .post_with_token(
                routes::RECONCILE,
                &json!({ "dry_run": true, "batch_size": 10 }),
                ADMIN_TOKEN,
            )
            .await;

        assert_eq!(res.status, 200, "Reconcile failed: {}", res.text);
        assert_eq!(res.body["dry_run"], true);
        assert_eq!(res.body["checked"], 1);
        assert_eq!(res.body["missing_staged"], 1);
        assert_eq!(res.body["updated"], 0);
        assert_eq!(res.body["examples"][0]["id"], row.id);
        assert_eq!(res.body["examples"][0]["status"], "ready");
    }

    #[tokio::test]
    async fn reconcile_rejects_unknown_status() {
        let app = TestApp::spawn().await;

        let res = app
            .post_with_token(
                routes::RECONCILE,
                &json!({ "status": "archived" }),
                ADMIN_TOKEN,
            )
            .await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn cleanup_stuck_returns_deleted_ids() {
        let app = TestApp::spawn().await;
        let res = app.upload(1, "a.jpg", b"stuck upload").await;
        let id = res.body["image"]["id"].as_i64().unwrap() as i32;
        app.ctx.age_staged(id, chrono::Duration::hours(5)).await;

        let res = app
            .post_with_token(
                routes::CLEANUP_STUCK,
                &json!({ "older_than_hours": 1 }),
                ADMIN_TOKEN,
            )
            .await;

        assert_eq!(res.status, 200, "Cleanup failed: {}", res.text);
        assert_eq!(res.body["deleted_ids"], json!([id]));
        assert_eq!(app.ctx.original_count().await, 0);
    }
}
