use common::StagedImageStatus;
use stagehand_server::error::ImageError;
use stagehand_server::originals::OriginalUpload;

use crate::common::{StagedRow, TestContext};

fn upload(data: &[u8]) -> OriginalUpload<'_> {
    OriginalUpload {
        data,
        mime_type: "image/jpeg",
        width: None,
        height: None,
    }
}

#[tokio::test]
async fn upload_queues_staged_image_pointing_at_original() {
    let ctx = TestContext::new().await;

    let created = ctx
        .state
        .staged
        .create_from_upload(7, upload(b"lounge"))
        .await
        .unwrap();

    assert_eq!(created.image.project_id, 7);
    assert_eq!(created.image.status, StagedImageStatus::Queued);
    assert_eq!(created.image.original_image_id, Some(created.original.id));
    assert_eq!(created.image.original_key, created.original.object_key);
    assert!(created.image.stored_key.is_none());
    assert!(!created.deduplicated);
    assert_eq!(created.original.reference_count, 1);
}

#[tokio::test]
async fn same_photo_in_two_projects_shares_the_original() {
    let ctx = TestContext::new().await;

    let first = ctx
        .state
        .staged
        .create_from_upload(1, upload(b"facade"))
        .await
        .unwrap();
    let second = ctx
        .state
        .staged
        .create_from_upload(2, upload(b"facade"))
        .await
        .unwrap();

    assert_ne!(first.image.id, second.image.id);
    assert!(second.deduplicated);
    assert_eq!(second.original.id, first.original.id);
    assert_eq!(second.original.reference_count, 2);
    assert_eq!(ctx.store.put_count(), 1);
}

mod transitions {
    use super::*;

    #[tokio::test]
    async fn happy_path_sets_stored_key() {
        let ctx = TestContext::new().await;
        let id = ctx
            .state
            .staged
            .create_from_upload(1, upload(b"dining"))
            .await
            .unwrap()
            .image
            .id;

        let processing = ctx.state.staged.mark_processing(id).await.unwrap();
        assert_eq!(processing.status, StagedImageStatus::Processing);

        let ready = ctx
            .state
            .staged
            .mark_ready(id, "staged/1/dining.jpg")
            .await
            .unwrap();
        assert_eq!(ready.status, StagedImageStatus::Ready);
        assert_eq!(ready.stored_key.as_deref(), Some("staged/1/dining.jpg"));
    }

    #[tokio::test]
    async fn backwards_move_is_rejected_and_row_unchanged() {
        let ctx = TestContext::new().await;
        let id = ctx
            .state
            .staged
            .create_from_upload(1, upload(b"study"))
            .await
            .unwrap()
            .image
            .id;
        ctx.state.staged.mark_processing(id).await.unwrap();
        ctx.state.staged.mark_ready(id, "staged/1/study.jpg").await.unwrap();

        let err = ctx.state.staged.mark_processing(id).await.unwrap_err();

        assert!(
            matches!(
                err,
                ImageError::InvalidTransition {
                    from: StagedImageStatus::Ready,
                    to: StagedImageStatus::Processing,
                    ..
                }
            ),
            "got {err:?}"
        );
        let row = ctx.state.staged.get(id).await.unwrap();
        assert_eq!(row.status, StagedImageStatus::Ready);
    }

    #[tokio::test]
    async fn queued_cannot_skip_to_ready() {
        let ctx = TestContext::new().await;
        let id = ctx
            .state
            .staged
            .create_from_upload(1, upload(b"nursery"))
            .await
            .unwrap()
            .image
            .id;

        let err = ctx.state.staged.mark_ready(id, "staged/x.jpg").await.unwrap_err();

        assert!(matches!(err, ImageError::InvalidTransition { .. }));
        let row = ctx.state.staged.get(id).await.unwrap();
        assert_eq!(row.status, StagedImageStatus::Queued);
        assert!(row.stored_key.is_none());
    }

    #[tokio::test]
    async fn failure_records_message() {
        let ctx = TestContext::new().await;
        let id = ctx
            .state
            .staged
            .create_from_upload(1, upload(b"loft"))
            .await
            .unwrap()
            .image
            .id;

        let failed = ctx
            .state
            .staged
            .mark_failed(id, "renderer crashed")
            .await
            .unwrap();

        assert_eq!(failed.status, StagedImageStatus::Error);
        assert_eq!(failed.error_message.as_deref(), Some("renderer crashed"));
        assert!(ctx.state.staged.mark_processing(id).await.is_err());
    }
}

mod soft_delete {
    use super::*;

    #[tokio::test]
    async fn releases_reference_and_keeps_row() {
        let ctx = TestContext::new().await;
        let first = ctx
            .state
            .staged
            .create_from_upload(1, upload(b"pool"))
            .await
            .unwrap();
        ctx.state
            .staged
            .create_from_upload(2, upload(b"pool"))
            .await
            .unwrap();

        let original_deleted = ctx.state.staged.soft_delete(first.image.id).await.unwrap();

        assert!(!original_deleted);
        let original = ctx.original(first.original.id).await.unwrap();
        assert_eq!(original.reference_count, 1);

        let row = ctx.staged_row(first.image.id).await.unwrap();
        assert!(row.deleted_at.is_some());
        assert!(matches!(
            ctx.state.staged.get(first.image.id).await,
            Err(ImageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn second_delete_is_not_found_and_does_not_decrement_again() {
        let ctx = TestContext::new().await;
        let first = ctx
            .state
            .staged
            .create_from_upload(1, upload(b"sauna"))
            .await
            .unwrap();
        ctx.state
            .staged
            .create_from_upload(2, upload(b"sauna"))
            .await
            .unwrap();

        ctx.state.staged.soft_delete(first.image.id).await.unwrap();
        let err = ctx.state.staged.soft_delete(first.image.id).await.unwrap_err();

        assert!(matches!(err, ImageError::NotFound(_)));
        let original = ctx.original(first.original.id).await.unwrap();
        assert_eq!(original.reference_count, 1);
    }

    #[tokio::test]
    async fn last_reference_removes_original() {
        let ctx = TestContext::new().await;
        let created = ctx
            .state
            .staged
            .create_from_upload(1, upload(b"balcony"))
            .await
            .unwrap();

        let original_deleted = ctx.state.staged.soft_delete(created.image.id).await.unwrap();

        assert!(original_deleted);
        assert!(ctx.original(created.original.id).await.is_none());
        assert!(!ctx.store.contains(&created.original.object_key));
    }

    #[tokio::test]
    async fn legacy_row_without_original_is_deleted() {
        let ctx = TestContext::new().await;
        let row = ctx
            .insert_staged(StagedRow::healthy(3, "legacy/3/a.jpg", "staged/3/a.jpg"))
            .await;

        let original_deleted = ctx.state.staged.soft_delete(row.id).await.unwrap();

        assert!(!original_deleted);
        assert!(ctx.staged_row(row.id).await.unwrap().deleted_at.is_some());
    }
}
