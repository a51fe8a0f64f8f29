//! Runs against a real S3-compatible endpoint when `S3_TEST_ENDPOINT`,
//! `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY` are set.

mod common;

use bytes::Bytes;
use http::StatusCode;

use s3_client::{Client, Error, MIN_CHUNK_SIZE};

use common::{LiveConfig, load_live_config, with_bucket};

fn build_client(cfg: &LiveConfig) -> Result<Client, Error> {
    Client::builder(&cfg.endpoint)?
        .credentials(cfg.credentials.clone())
        .force_path_style(true)
        .build()
}

#[test]
fn live_object_roundtrip_and_listing() -> Result<(), Error> {
    let Some(cfg) = load_live_config()? else {
        return Ok(());
    };
    let client = build_client(&cfg)?;

    with_bucket(&client, "s3-client-it-", |bucket| {
        let key = "hello.txt";
        client.objects().put(&bucket, key).body("hello").send()?;

        let got = client.objects().get(&bucket, key).send()?;
        assert_eq!(got.body, Bytes::from_static(b"hello"));

        let range = client.objects().get(&bucket, key).range_bytes(0, 3).send()?;
        assert_eq!(range.body, Bytes::from_static(b"hell"));

        for k in ["a/1.txt", "a/2.txt", "a/3.txt", "b/1.txt"] {
            client.objects().put(&bucket, k).body("x").send()?;
        }

        let mut keys = Vec::new();
        for entry in client.objects().list(&bucket).prefix("a/").max_keys(2).entries() {
            keys.push(entry?.key);
        }
        assert_eq!(keys, ["a/1.txt", "a/2.txt", "a/3.txt"]);

        let page = client.objects().list(&bucket).delimiter("/").send()?;
        assert!(page.common_prefixes.iter().any(|p| p == "a/"));
        assert!(page.keys().any(|k| k == key));

        match client.objects().get(&bucket, "does-not-exist").send() {
            Ok(_) => panic!("expected not found error"),
            Err(err) => assert_eq!(err.status(), Some(StatusCode::NOT_FOUND)),
        }

        let presigned = client.objects().presign_get(&bucket, key).build()?;
        let resp = ureq::get(presigned.url.as_str())
            .call()
            .map_err(|e| Error::transport("presigned request failed", Some(Box::new(e))))?;
        assert!(resp.status().is_success());
        Ok(())
    })
}

#[test]
fn live_multipart_upload() -> Result<(), Error> {
    let Some(cfg) = load_live_config()? else {
        return Ok(());
    };
    let client = build_client(&cfg)?;

    with_bucket(&client, "s3-client-mp-", |bucket| {
        let data = vec![b'z'; 2 * MIN_CHUNK_SIZE + 17];
        let out = client
            .objects()
            .multipart_upload(&bucket, "big.bin")
            .chunk_size(MIN_CHUNK_SIZE)
            .workers(2)
            .send_bytes(data.clone())?;
        assert_eq!(out.parts, 3);

        let got = client.objects().get(&bucket, "big.bin").send()?;
        assert_eq!(got.body.len(), data.len());
        Ok(())
    })
}
