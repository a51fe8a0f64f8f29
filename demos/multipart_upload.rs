use std::env;

use s3_client::{Client, Credentials, MIN_CHUNK_SIZE};

fn main() -> Result<(), s3_client::Error> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (Ok(endpoint), [bucket, key, path, ..]) = (env::var("S3_TEST_ENDPOINT"), args.as_slice())
    else {
        eprintln!("usage: S3_TEST_ENDPOINT=http://127.0.0.1:9000 multipart_upload <bucket> <key> <file> [workers]");
        return Ok(());
    };

    let workers = args
        .get(3)
        .and_then(|w| w.parse().ok())
        .unwrap_or(2);

    let client = Client::builder(&endpoint)?
        .credentials(Credentials::from_env()?)
        .build()?;

    let out = client
        .objects()
        .multipart_upload(bucket, key)
        .chunk_size(MIN_CHUNK_SIZE * 4)
        .workers(workers)
        .send_path(path)?;

    println!("uploaded {} parts as {}", out.parts, out.upload_id);
    if let Some(etag) = out.etag {
        println!("etag {etag}");
    }

    Ok(())
}
