use {
    super::{BlobStore, Download, Upload},
    anyhow::{Context as _, Result, format_err},
    base64::{
        Engine as _,
        engine::{GeneralPurpose, general_purpose::STANDARD},
        write::EncoderStringWriter,
    },
    serde::{Serialize, de::DeserializeOwned},
    stash_protocol::{
        StashId,
        endpoints::{CopyRequest, PasteRequest, RequestToResponse},
    },
    std::{
        fmt,
        io::{self, Cursor, Read, Write},
    },
    tracing::{debug, instrument},
    url::Url,
};

/// Talks to a `stash-relay` server.
///
/// The whole blob is buffered: it is base64-encoded while being written and sent in a single
/// request on commit.
pub struct HttpRelayStore {
    reqwest: reqwest::blocking::Client,
    endpoint: Url,
}

impl fmt::Debug for HttpRelayStore {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRelayStore")
            .field("endpoint", &self.endpoint.as_str())
            .finish()
    }
}

impl HttpRelayStore {
    #[inline]
    pub fn new(endpoint: Url) -> Result<Self> {
        Ok(Self {
            // Large stashes may take arbitrarily long to transfer.
            reqwest: reqwest::blocking::Client::builder()
                .timeout(None)
                .build()
                .context("failed to build HTTP client")?,
            endpoint,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| format_err!("invalid relay endpoint: {}", self.endpoint))?
            .pop_if_empty()
            .push(path);
        Ok(url)
    }

    #[instrument(skip_all, fields(path = R::PATH))]
    fn request<R>(&self, request: &R) -> Result<R::Response>
    where
        R: RequestToResponse + Serialize,
        R::Response: DeserializeOwned,
    {
        let url = self.url(R::PATH)?;
        debug!("POST {url}");
        self.reqwest
            .post(url.clone())
            .json(request)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::json)
            .with_context(|| format!("relay request to {url} failed"))
    }
}

impl BlobStore for HttpRelayStore {
    fn upload(&self) -> Result<Box<dyn Upload + '_>> {
        Ok(Box::new(RelayUpload {
            store: self,
            payload: EncoderStringWriter::new(&STANDARD),
        }))
    }

    fn download(&self, id: &StashId) -> Result<Box<dyn Download + '_>> {
        let payload = self
            .request(&PasteRequest { id: id.clone() })?
            .into_result()?;
        let data = STANDARD
            .decode(payload)
            .context("relay returned invalid base64 payload")?;
        Ok(Box::new(RelayDownload(Cursor::new(data))))
    }
}

struct RelayUpload<'a> {
    store: &'a HttpRelayStore,
    payload: EncoderStringWriter<'static, GeneralPurpose, String>,
}

impl Write for RelayUpload<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.payload.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.payload.flush()
    }
}

impl Upload for RelayUpload<'_> {
    fn finish(self: Box<Self>) -> Result<StashId> {
        let request = CopyRequest {
            payload: self.payload.into_inner(),
        };
        self.store.request(&request)?.into_result()
    }
}

struct RelayDownload(Cursor<Vec<u8>>);

impl Read for RelayDownload {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Download for RelayDownload {
    fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
