#![allow(dead_code)]

use std::{
    collections::VecDeque,
    env,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode};

use s3_client::{Client, Credentials, Error, HttpRequest, HttpResponse, HttpTransport};

static BUCKET_COUNTER: AtomicUsize = AtomicUsize::new(0);

pub(crate) const ENDPOINT: &str = "https://s3.example.com";

type Handler = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync>;

/// In-memory transport: records every request and answers through a handler.
pub(crate) struct MockTransport {
    requests: Mutex<Vec<HttpRequest>>,
    handler: Handler,
}

impl MockTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> Result<HttpResponse, Error> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            handler: Box::new(handler),
        })
    }

    /// Answers requests with `responses` in order; extra requests get a 500.
    pub(crate) fn scripted(responses: Vec<HttpResponse>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            Ok(queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| response(500, "unexpected request")))
        })
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn requests_with(&self, method: Method) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let result = (self.handler)(&request);
        self.requests.lock().unwrap().push(request);
        result
    }
}

pub(crate) fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status: StatusCode::from_u16(status).unwrap(),
        headers: HeaderMap::new(),
        body: Bytes::from(body.to_string()),
    }
}

pub(crate) fn with_header(mut resp: HttpResponse, name: &'static str, value: &str) -> HttpResponse {
    resp.headers
        .insert(name, HeaderValue::from_str(value).unwrap());
    resp
}

pub(crate) fn mock_client(transport: Arc<MockTransport>) -> Client {
    Client::builder(ENDPOINT)
        .unwrap()
        .credentials(Credentials::new("AKIDEXAMPLE", "secret_access_key").unwrap())
        .transport(transport)
        .build()
        .unwrap()
}

pub(crate) fn query_value(url: &str, name: &str) -> Option<String> {
    let parsed = url::Url::parse(url).unwrap();
    parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub(crate) fn header<'a>(req: &'a HttpRequest, name: &str) -> Option<&'a str> {
    req.headers.get(name).and_then(|v| v.to_str().ok())
}

pub(crate) fn listing_xml(keys: &[&str], truncated: bool, next_marker: Option<&str>) -> String {
    let contents: String = keys
        .iter()
        .map(|k| {
            format!(
                "<Contents><Key>{k}</Key><LastModified>2014-08-21T14:00:00.000Z</LastModified>\
                 <ETag>&quot;d41d8cd98f00b204e9800998ecf8427e&quot;</ETag><Size>10</Size></Contents>"
            )
        })
        .collect();
    let next = next_marker
        .map(|m| format!("<NextMarker>{m}</NextMarker>"))
        .unwrap_or_default();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <Name>bucket</Name><Prefix></Prefix><Marker></Marker>{next}\
         <MaxKeys>1000</MaxKeys><IsTruncated>{truncated}</IsTruncated>{contents}\
         </ListBucketResult>"
    )
}

pub(crate) struct LiveConfig {
    pub(crate) endpoint: String,
    pub(crate) credentials: Credentials,
}

/// Reads `S3_TEST_ENDPOINT` plus the usual credential variables.
pub(crate) fn load_live_config() -> Result<Option<LiveConfig>, Error> {
    let Ok(endpoint) = env::var("S3_TEST_ENDPOINT") else {
        return Ok(None);
    };

    let Ok(credentials) = Credentials::from_env() else {
        return Ok(None);
    };

    Ok(Some(LiveConfig {
        endpoint,
        credentials,
    }))
}

pub(crate) fn unique_bucket(prefix: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let n = BUCKET_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}{now}-{n}")
}

/// Runs `f` against a fresh bucket and removes the bucket afterwards.
pub(crate) fn with_bucket<F>(client: &Client, prefix: &str, f: F) -> Result<(), Error>
where
    F: FnOnce(String) -> Result<(), Error>,
{
    let bucket = unique_bucket(prefix);
    client.buckets().create(&bucket).send()?;

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(bucket.clone())));
    let cleanup = cleanup_bucket(client, &bucket);

    match result {
        Ok(Ok(())) => cleanup,
        Ok(Err(err)) => {
            let _ = cleanup;
            Err(err)
        }
        Err(panic) => {
            let _ = cleanup;
            std::panic::resume_unwind(panic);
        }
    }
}

fn cleanup_bucket(client: &Client, bucket: &str) -> Result<(), Error> {
    let keys: Vec<String> = client
        .objects()
        .list(bucket)
        .entries()
        .map(|entry| entry.map(|e| e.key))
        .collect::<Result<_, _>>()?;
    for key in keys {
        client.objects().delete(bucket, key).send()?;
    }

    match client.buckets().delete(bucket).send() {
        Ok(()) => Ok(()),
        Err(Error::Api {
            status: StatusCode::NOT_FOUND,
            ..
        }) => Ok(()),
        Err(err) => Err(err),
    }
}
