use bytes::Bytes;

use crate::{error::Error, types};

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// `<Error>` document; `None` unless it carries a `Code`.
pub(crate) fn parse_error_xml(body: &str) -> Option<types::ParsedError> {
    let body = body.trim();
    if !body.starts_with('<') {
        return None;
    }

    let parsed = quick_xml::de::from_str::<types::XmlError>(body).ok()?;
    let parsed = types::ParsedError::from(parsed);
    parsed.code.as_ref()?;
    Some(parsed)
}

/// JSON error object; `None` unless it carries a `code`.
pub(crate) fn parse_error_json(body: &str) -> Option<types::ParsedError> {
    let body = body.trim();
    if !body.starts_with('{') {
        return None;
    }

    let parsed = serde_json::from_str::<types::JsonError>(body).ok()?;
    let parsed = types::ParsedError::from(parsed);
    parsed.code.as_ref()?;
    Some(parsed)
}

pub(crate) fn parse_list_objects(body: &str) -> Result<types::ListObjectsPage, Error> {
    let parsed = quick_xml::de::from_str::<types::XmlListBucketResult>(body).map_err(|e| {
        Error::decode("failed to parse ListObjects XML response", Some(Box::new(e)))
    })?;
    Ok(types::ListObjectsPage::from(parsed))
}

pub(crate) fn parse_list_buckets(body: &str) -> Result<types::ListBucketsOutput, Error> {
    let parsed =
        quick_xml::de::from_str::<types::XmlListAllMyBucketsResult>(body).map_err(|e| {
            Error::decode(
                "failed to parse ListBuckets XML response",
                Some(Box::new(e)),
            )
        })?;
    Ok(types::ListBucketsOutput::from(parsed))
}

pub(crate) fn parse_initiate_multipart_upload(body: &str) -> Result<String, Error> {
    let parsed = quick_xml::de::from_str::<types::XmlInitiateMultipartUploadResult>(body)
        .map_err(|e| {
            Error::decode(
                "failed to parse InitiateMultipartUpload XML response",
                Some(Box::new(e)),
            )
        })?;

    let upload_id = parsed.upload_id.trim();
    if upload_id.is_empty() {
        return Err(Error::decode(
            "InitiateMultipartUpload response has an empty UploadId",
            None,
        ));
    }
    Ok(upload_id.to_string())
}

/// Completion bodies are optional; anything unparseable yields empty fields.
pub(crate) fn parse_complete_multipart_upload(
    body: &str,
) -> Option<types::XmlCompleteMultipartUploadResult> {
    if body.trim().is_empty() {
        return None;
    }
    quick_xml::de::from_str(body).ok()
}

pub(crate) fn encode_create_bucket_configuration(location: &str) -> Result<Bytes, Error> {
    if location.trim().is_empty() {
        return Err(Error::invalid_config(
            "create bucket location constraint must not be empty",
        ));
    }

    #[derive(serde::Serialize)]
    #[serde(rename = "CreateBucketConfiguration")]
    struct XmlCreateBucketConfiguration<'a> {
        #[serde(rename = "@xmlns")]
        xmlns: &'static str,
        #[serde(rename = "LocationConstraint")]
        location_constraint: &'a str,
    }

    let xml = quick_xml::se::to_string(&XmlCreateBucketConfiguration {
        xmlns: S3_XMLNS,
        location_constraint: location,
    })
    .map_err(|e| {
        Error::decode(
            "failed to encode CreateBucketConfiguration XML",
            Some(Box::new(e)),
        )
    })?;
    Ok(Bytes::from(xml))
}

/// Manifest for `CompleteMultipartUpload`, in the order given.
pub(crate) fn encode_complete_multipart_upload(
    parts: &[types::UploadPart],
) -> Result<Bytes, Error> {
    if parts.is_empty() {
        return Err(Error::parameter_invalid(
            "complete multipart upload requires at least one part",
        ));
    }

    #[derive(serde::Serialize)]
    #[serde(rename = "CompleteMultipartUpload")]
    struct XmlOut<'a> {
        #[serde(rename = "Part")]
        parts: Vec<XmlPart<'a>>,
    }

    #[derive(serde::Serialize)]
    struct XmlPart<'a> {
        #[serde(rename = "PartNumber")]
        part_number: u32,
        #[serde(rename = "ETag")]
        etag: &'a str,
    }

    let xml = quick_xml::se::to_string(&XmlOut {
        parts: parts
            .iter()
            .map(|p| XmlPart {
                part_number: p.part_number,
                etag: &p.etag,
            })
            .collect(),
    })
    .map_err(|e| {
        Error::decode(
            "failed to encode CompleteMultipartUpload XML",
            Some(Box::new(e)),
        )
    })?;

    Ok(Bytes::from(xml))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_buckets() {
        let xml = r#"
<ListAllMyBucketsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Owner>
    <ID>owner-id</ID>
    <DisplayName>owner</DisplayName>
  </Owner>
  <Buckets>
    <Bucket>
      <Name>bucket-a</Name>
      <CreationDate>2014-08-21T00:00:00.000Z</CreationDate>
    </Bucket>
    <Bucket>
      <Name>bucket-b</Name>
      <CreationDate>2014-08-22T00:00:00.000Z</CreationDate>
    </Bucket>
  </Buckets>
</ListAllMyBucketsResult>
"#;

        let out = parse_list_buckets(xml).unwrap();
        assert_eq!(out.owner.unwrap().display_name.as_deref(), Some("owner"));
        let names: Vec<_> = out.buckets.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, ["bucket-a", "bucket-b"]);
    }

    #[test]
    fn parses_list_objects_page() {
        let xml = r#"
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>bucket</Name>
  <Prefix></Prefix>
  <Marker></Marker>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>false</IsTruncated>
  <Contents>
    <Key>my-image.jpg</Key>
    <LastModified>2009-10-12T17:50:30.000Z</LastModified>
    <ETag>"fba9dede5f27731c9771645a39863328"</ETag>
    <Size>434234</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
  <Contents>
    <Key>my-third-image.jpg</Key>
    <LastModified>2009-10-12T17:50:30.000Z</LastModified>
    <ETag>"1b2cf535f27731c974343645a3985328"</ETag>
    <Size>64994</Size>
    <StorageClass>STANDARD</StorageClass>
  </Contents>
</ListBucketResult>
"#;

        let page = parse_list_objects(xml).unwrap();
        assert_eq!(page.name, "bucket");
        assert_eq!(page.prefix, None);
        assert_eq!(page.marker, None);
        assert_eq!(page.max_keys, Some(1000));
        assert!(!page.is_truncated);
        assert_eq!(
            page.keys().collect::<Vec<_>>(),
            ["my-image.jpg", "my-third-image.jpg"]
        );
        assert_eq!(page.entries[0].size, 434_234);
        assert_eq!(page.entries[1].storage_class.as_deref(), Some("STANDARD"));
    }

    #[test]
    fn parses_truncated_page_with_next_marker() {
        let xml = r#"
<ListBucketResult>
  <Name>bucket</Name>
  <Prefix>logs/</Prefix>
  <NextMarker>logs/b</NextMarker>
  <IsTruncated>true</IsTruncated>
  <Contents><Key>logs/a</Key><Size>1</Size></Contents>
  <CommonPrefixes><Prefix>logs/2014/</Prefix></CommonPrefixes>
</ListBucketResult>
"#;
        let page = parse_list_objects(xml).unwrap();
        assert!(page.is_truncated);
        assert_eq!(page.prefix.as_deref(), Some("logs/"));
        assert_eq!(page.next_marker.as_deref(), Some("logs/b"));
        assert_eq!(page.common_prefixes, ["logs/2014/"]);
    }

    #[test]
    fn parses_error_documents() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>NoSuchKey</Code>
  <Message>The resource you requested does not exist</Message>
  <Resource>/mybucket/myfoto.jpg</Resource>
  <RequestId>4442587FB7D0A2F9</RequestId>
</Error>"#;
        let parsed = parse_error_xml(xml).unwrap();
        assert_eq!(parsed.code.as_deref(), Some("NoSuchKey"));
        assert_eq!(parsed.resource.as_deref(), Some("/mybucket/myfoto.jpg"));
        assert_eq!(parsed.status, None);

        let json = r#"{"code":"BucketNotFound","message":"not found","status":404,"requestId":"r-1","resource":"/b"}"#;
        let parsed = parse_error_json(json).unwrap();
        assert_eq!(parsed.code.as_deref(), Some("BucketNotFound"));
        assert_eq!(parsed.status, Some(404));
        assert_eq!(parsed.request_id.as_deref(), Some("r-1"));

        assert!(parse_error_xml("not xml").is_none());
        assert!(parse_error_json("<Error/>").is_none());
        assert!(parse_error_json(r#"{"message":"no code"}"#).is_none());
    }

    #[test]
    fn parses_initiate_result() {
        let xml = r#"
<InitiateMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Bucket>example-bucket</Bucket>
  <Key>example-object</Key>
  <UploadId>VXBsb2FkIElEIGZvciA2aWWpbmcncyBteS1tb3ZpZS5tMnRzIHVwbG9hZA</UploadId>
</InitiateMultipartUploadResult>"#;
        assert_eq!(
            parse_initiate_multipart_upload(xml).unwrap(),
            "VXBsb2FkIElEIGZvciA2aWWpbmcncyBteS1tb3ZpZS5tMnRzIHVwbG9hZA"
        );
        assert!(parse_initiate_multipart_upload("<Nope/>").is_err());
    }

    #[test]
    fn encodes_complete_multipart_upload() {
        let parts = vec![
            types::UploadPart {
                part_number: 1,
                etag: "\"etag1\"".to_string(),
            },
            types::UploadPart {
                part_number: 2,
                etag: "\"etag2\"".to_string(),
            },
        ];
        let xml = encode_complete_multipart_upload(&parts).unwrap();
        let xml = String::from_utf8_lossy(&xml).to_string();
        assert!(xml.starts_with("<CompleteMultipartUpload>"));
        assert!(xml.contains("<PartNumber>1</PartNumber>"));
        assert!(xml.contains("<ETag>\"etag1\"</ETag>"));
        let first = xml.find("<PartNumber>1").unwrap();
        let second = xml.find("<PartNumber>2").unwrap();
        assert!(first < second);
    }

    #[test]
    fn encodes_bucket_configuration() {
        let xml = encode_create_bucket_configuration("ap-northeast-1").unwrap();
        let xml = String::from_utf8_lossy(&xml).to_string();
        assert!(xml.contains("<CreateBucketConfiguration"));
        assert!(xml.contains("<LocationConstraint>ap-northeast-1</LocationConstraint>"));
        assert!(encode_create_bucket_configuration(" ").is_err());
    }
}
