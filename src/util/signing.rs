use base64::Engine as _;
use hmac::{Hmac, Mac as _};
use http::Method;
use sha1::Sha1;
use time::{Month, OffsetDateTime, UtcOffset, Weekday};
use url::Url;

use crate::{
    auth::{AddressingStyle, Credentials},
    error::Error,
    request::RequestDescriptor,
    types::PresignedRequest,
};

type HmacSha1 = Hmac<Sha1>;

/// Base64(HMAC-SHA1(secret, string_to_sign)).
pub(crate) fn sign(secret_access_key: &str, string_to_sign: &str) -> Result<String, Error> {
    let mut mac = HmacSha1::new_from_slice(secret_access_key.as_bytes())
        .map_err(|_| Error::signing("invalid HMAC key"))?;
    mac.update(string_to_sign.as_bytes());
    let digest = mac.finalize().into_bytes();
    Ok(base64::engine::general_purpose::STANDARD
        .encode(digest)
        .trim_end()
        .to_string())
}

pub(crate) fn authorization(access_key_id: &str, signature: &str) -> String {
    format!("AWS {access_key_id}:{signature}")
}

/// RFC 2822 / HTTP date in GMT, e.g. `Thu, 21 Aug 2014 14:00:00 GMT`.
pub(crate) fn http_date(now: OffsetDateTime) -> String {
    let now = now.to_offset(UtcOffset::UTC);
    let weekday = match now.weekday() {
        Weekday::Monday => "Mon",
        Weekday::Tuesday => "Tue",
        Weekday::Wednesday => "Wed",
        Weekday::Thursday => "Thu",
        Weekday::Friday => "Fri",
        Weekday::Saturday => "Sat",
        Weekday::Sunday => "Sun",
    };
    let month = match now.month() {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    };
    format!(
        "{weekday}, {:02} {month} {:04} {:02}:{:02}:{:02} GMT",
        now.day(),
        now.year(),
        now.hour(),
        now.minute(),
        now.second()
    )
}

/// Resource term of a download signature; path style leaves the bucket out.
pub(crate) fn download_resource(bucket: &str, object: &str, addressing: AddressingStyle) -> String {
    let base = if addressing.is_path() {
        String::new()
    } else {
        format!("/{bucket}")
    };
    crate::util::url::join_path(&base, object)
}

/// Signature for a time-limited GET; the expiry epoch takes the place of the date.
pub(crate) fn download_signature(
    secret_access_key: &str,
    expires_at: i64,
    resource: &str,
) -> Result<String, Error> {
    let string_to_sign = format!("GET\n\n\n{expires_at}\n{resource}");
    sign(secret_access_key, &string_to_sign)
}

/// Builds a query-string authenticated GET URL for `bucket`/`object`.
pub(crate) fn presign_download(
    endpoint: &Url,
    bucket: &str,
    object: &str,
    credentials: &Credentials,
    expires_at: OffsetDateTime,
    addressing: AddressingStyle,
) -> Result<PresignedRequest, Error> {
    let expires = expires_at.unix_timestamp();
    let resource = crate::util::encode::object_resource(object);
    let signature = download_signature(
        &credentials.secret_access_key,
        expires,
        &download_resource(bucket, &resource, addressing),
    )?;

    let url = RequestDescriptor::new(Method::GET, resource)
        .bucket(bucket)
        .query_param("AWSAccessKeyId", credentials.access_key_id.as_str())
        .query_param("Expires", expires.to_string())
        .query_param("Signature", signature)
        .url(endpoint, addressing);
    let url = Url::parse(&url)
        .map_err(|_| Error::invalid_config("presigned URL is not a valid absolute URL"))?;

    Ok(PresignedRequest {
        method: Method::GET,
        url,
    })
}
