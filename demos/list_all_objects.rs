use std::env;

use s3_client::{Client, Credentials};

fn main() -> Result<(), s3_client::Error> {
    let (Ok(endpoint), Some(bucket)) = (env::var("S3_TEST_ENDPOINT"), env::args().nth(1)) else {
        eprintln!("usage: S3_TEST_ENDPOINT=http://127.0.0.1:9000 list_all_objects <bucket> [prefix]");
        return Ok(());
    };

    let credentials = match Credentials::from_env() {
        Ok(v) => v,
        Err(err) => {
            eprintln!("Set AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY: {err}");
            return Ok(());
        }
    };

    let client = Client::builder(&endpoint)?
        .credentials(credentials)
        .build()?;

    let mut request = client.objects().list(bucket);
    if let Some(prefix) = env::args().nth(2) {
        request = request.prefix(prefix);
    }

    let mut total = 0u64;
    for entry in request.entries() {
        let entry = entry?;
        total += entry.size;
        println!("{:>12}  {}", entry.size, entry.key);
    }
    println!("{total} bytes");

    Ok(())
}
