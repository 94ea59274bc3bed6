use super::*;
use crate::downloader::submit::destination_hint;

#[tokio::test]
async fn test_missing_fields_are_invalid_arguments() {
    let (downloader, gateway, temp_dir) = create_test_downloader().await;
    let dest = temp_dir.path().join("f.bin");

    let cases = [
        DownloadRequest::new("", "http://x/file.bin", &dest),
        DownloadRequest::new("a", "", &dest),
        DownloadRequest::new("a", "http://x/file.bin", ""),
        DownloadRequest::new("a", "http://x/file.bin", "relative/f.bin"),
    ];
    for req in cases {
        let err = downloader
            .submit(req.clone(), DownloadOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{req:?}: {err}");
        assert_eq!(err.error_code(), ErrorCode::InvalidArgument);
    }

    assert!(gateway.enqueued().is_empty());
    assert_eq!(downloader.db.count_tasks().await.unwrap(), 0);
}

#[tokio::test]
async fn test_duplicate_id_is_rejected() {
    let (downloader, gateway, temp_dir) = create_test_downloader().await;
    let server = file_server(10).await;
    let url = file_url(&server);

    downloader
        .submit(request("a", &url, temp_dir.path()), DownloadOptions::default())
        .await
        .unwrap();
    let err = downloader
        .submit(request("a", &url, temp_dir.path()), DownloadOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(gateway.enqueued().len(), 1);
}

#[tokio::test]
async fn test_task_is_persisted_before_submit_returns() {
    let (downloader, _gateway, temp_dir) = create_test_downloader().await;
    let server = file_server(10).await;
    let url = file_url(&server);
    let req = request("a", &url, temp_dir.path()).with_metadata("{\"k\":1}");
    let options = DownloadOptions {
        notification_title: Some("Episode 1".to_string()),
        ..Default::default()
    };

    let handle = downloader.submit(req.clone(), options).await.unwrap();

    let stored = downloader.db.get_task(handle).await.unwrap().unwrap();
    assert_eq!(stored.id, "a");
    assert_eq!(stored.url, url);
    assert_eq!(stored.destination, req.destination);
    assert_eq!(stored.metadata, "{\"k\":1}");
    assert_eq!(stored.notification_title.as_deref(), Some("Episode 1"));
    assert_eq!(
        downloader.maps.lock().await.handles.get(&TaskId::from("a")),
        Some(&handle)
    );
}

#[tokio::test]
async fn test_gateway_request_carries_headers_and_policy() {
    let (downloader, gateway, temp_dir) = create_test_downloader().await;
    let server = file_server(10).await;
    let url = file_url(&server);
    let options = DownloadOptions {
        headers: HashMap::from([("Authorization".to_string(), "Bearer t".to_string())]),
        allow_metered: false,
        notification_visible: true,
        notification_title: Some("Title".to_string()),
        ..Default::default()
    };

    let handle = downloader
        .submit(request("a", &url, temp_dir.path()), options)
        .await
        .unwrap();

    let sent = gateway.request(handle).unwrap();
    assert_eq!(sent.url, url);
    assert!(!sent.allow_metered);
    assert!(sent.allow_roaming);
    assert_eq!(sent.visibility, Visibility::VisibleNotifyCompleted);
    assert_eq!(sent.title.as_deref(), Some("Title"));
    assert!(sent.destination_hint.ends_with(".bin"));
    let names: Vec<&str> = sent.headers.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Connection", "Keep-Alive", "User-Agent", "Authorization"]
    );
}

#[tokio::test]
async fn test_redirects_are_resolved_when_enabled() {
    let (downloader, gateway, temp_dir) = create_test_downloader().await;
    let server = file_server(10).await;
    Mock::given(method("HEAD"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/file.bin"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let start = format!("{}/start", server.uri());
    let options = DownloadOptions {
        max_redirects: 3,
        ..Default::default()
    };

    let handle = downloader
        .submit(request("a", &start, temp_dir.path()), options)
        .await
        .unwrap();

    assert_eq!(gateway.request(handle).unwrap().url, file_url(&server));
    assert_eq!(
        downloader.db.get_task(handle).await.unwrap().unwrap().url,
        file_url(&server)
    );
}

#[tokio::test]
async fn test_gateway_rejection_leaves_nothing_tracked() {
    let (downloader, gateway, temp_dir) = create_test_downloader().await;
    gateway.reject_enqueue(Some("no storage permission"));

    let err = downloader
        .submit(
            request("a", "http://127.0.0.1:9/file.bin", temp_dir.path()),
            DownloadOptions::default(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Gateway(_)));
    assert_eq!(downloader.db.count_tasks().await.unwrap(), 0);
    assert!(downloader.maps.lock().await.handles.is_empty());
}

#[tokio::test]
async fn test_progress_overrides_apply_and_persist() {
    let (downloader, _gateway, temp_dir) = create_test_downloader().await;
    let options = DownloadOptions {
        progress_interval: Some(Duration::from_secs(5)),
        progress_min_bytes: Some(4096),
        ..Default::default()
    };

    downloader
        .submit(
            request("a", "http://127.0.0.1:9/file.bin", temp_dir.path()),
            options,
        )
        .await
        .unwrap();

    assert_eq!(
        downloader.progress_settings(),
        (Duration::from_secs(5), 4096)
    );
    assert_eq!(
        downloader.db.get_progress_interval().await.unwrap(),
        Some(Duration::from_secs(5))
    );
    assert_eq!(downloader.db.get_progress_min_bytes().await.unwrap(), Some(4096));
}

#[test]
fn test_destination_hint_keeps_extension() {
    assert_eq!(
        destination_hint(Path::new("/data/movie.mp4"), 0x1234_5678_9abc),
        "108567228.mp4"
    );
    assert_eq!(destination_hint(Path::new("/data/README"), 42), "42");
}
