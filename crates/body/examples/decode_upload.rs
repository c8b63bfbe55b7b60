use bytes::Bytes;
use http::{header, Request};
use http_body_util::Full;
use micro_body::decoder::BodyDecoder;
use micro_body::protocol::{BodyParserConfig, ByteSize};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const BODY: &str = "--X-BOUNDARY\r\n\
    Content-Disposition: form-data; name=\"user[email][]\"\r\n\r\n\
    a@x.com\r\n\
    --X-BOUNDARY\r\n\
    Content-Disposition: form-data; name=\"user[email][]\"\r\n\r\n\
    b@x.com\r\n\
    --X-BOUNDARY\r\n\
    Content-Disposition: form-data; name=\"user[age]\"\r\n\r\n\
    22\r\n\
    --X-BOUNDARY\r\n\
    Content-Disposition: form-data; name=\"avatar\"; filename=\"avatar.txt\"\r\n\
    Content-Type: text/plain\r\n\r\n\
    pretend this is an image\r\n\
    --X-BOUNDARY--\r\n";

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = BodyParserConfig::default().max_upload_size(ByteSize::kib(64));
    let decoder = BodyDecoder::new(config);

    let request = Request::builder()
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=X-BOUNDARY")
        .header(header::CONTENT_LENGTH, BODY.len())
        .body(Full::new(Bytes::from_static(BODY.as_bytes())))
        .unwrap();

    let decoded = match decoder.decode_request(request).await {
        Ok(decoded) => decoded,
        Err(e) => {
            error!(code = e.code(), status = %e.status(), cause = %e, "failed to decode body");
            return;
        }
    };

    info!(fields = %serde_json::to_string(&decoded.fields).unwrap(), "decoded fields");
    for file in decoded.files.values().flat_map(|field| field.iter()) {
        info!(
            field = file.field_name,
            name = file.original_name,
            path = %file.stored_path.display(),
            size = file.size_bytes,
            "stored upload"
        );
        let _ = std::fs::remove_file(&file.stored_path);
    }
}
