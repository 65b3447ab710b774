// API client module: the remote directory client seam and its OneDrive
// implementation. Everything here is blocking on purpose; the interactive
// loop issues one request at a time and waits for it.

use reqwest::blocking::{Body, Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::RemoteEntry;

pub const DEFAULT_API_URL: &str = "https://graph.microsoft.com/v1.0";

/// Operations the navigation loop, the transfer code and the folder mirror
/// need from a remote drive.
pub trait DriveClient {
    /// List the children of the folder at `path` (`""` is the drive root),
    /// in the order the drive returns them.
    fn list_by_path(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    /// Fetch the record of a single item.
    fn get_metadata(&self, id: &str) -> Result<RemoteEntry>;

    /// Write the content of item `id` to `local_path`, returning the byte count.
    fn download_content(&self, id: &str, local_path: &Path) -> Result<u64>;

    /// Store the content of `local_path` at `remote_path` (folder path plus
    /// file name) and return the record of the created item.
    fn upload_content(&self, remote_path: &str, local_path: &Path) -> Result<RemoteEntry>;
}

/// Turns a credential into a ready client.
pub trait Connector {
    type Client: DriveClient;

    fn connect(&self, token: &str) -> Result<Self::Client>;
}

/// OneDrive client over the Microsoft Graph REST API.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct ChildrenPage {
    #[serde(default)]
    value: Vec<Value>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

impl GraphClient {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Transfer(format!("failed to build HTTP client: {e}")))?;
        Ok(GraphClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    /// `{base}/{segments...}` with every segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Transfer(format!("bad API base url {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|_| Error::Transfer(format!("API base url cannot hold a path: {}", self.base_url)))?
            .extend(segments);
        Ok(url)
    }

    /// Address an item by drive path using the `root:/a/b:` syntax, with an
    /// optional trailing relation such as `children` or `content`.
    fn path_url(&self, path: &str, relation: &str) -> Result<Url> {
        let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let last;
        let mut segments = vec!["me", "drive"];
        match parts.split_last() {
            None => segments.push("root"),
            Some((tail, init)) => {
                segments.push("root:");
                segments.extend(init.iter().copied());
                last = format!("{tail}:");
                segments.push(&last);
            }
        }
        if !relation.is_empty() {
            segments.push(relation);
        }
        self.url(&segments)
    }

    /// Attach the bearer token, send, and turn non-2xx answers into errors.
    /// `what` names the path or id in error messages.
    fn send(&self, req: RequestBuilder, what: &str) -> Result<Response> {
        let res = req.bearer_auth(&self.token).send()?;
        check_status(res, what)
    }

    /// Confirm the token is accepted by asking for the default drive.
    pub fn verify(&self) -> Result<()> {
        let url = self.url(&["me", "drive"])?;
        self.send(self.client.get(url), "drive")?;
        Ok(())
    }
}

/// Map HTTP status classes onto the error taxonomy.
fn check_status(res: Response, what: &str) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(Error::not_found(what)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(Error::Auth(format!("{status} on {what}: {body}")))
        }
        _ => Err(Error::Transfer(format!("{status} on {what}: {body}"))),
    }
}

impl DriveClient for GraphClient {
    /// GET `root:/{path}:/children`, following `@odata.nextLink` until the
    /// last page.
    fn list_by_path(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let what = if path.is_empty() { "<ROOT>" } else { path };
        let mut next = Some(self.path_url(path, "children")?);
        let mut entries = Vec::new();

        while let Some(url) = next.take() {
            debug!(%url, "fetching listing page");
            let res = self.send(self.client.get(url), what)?;
            let page: ChildrenPage = res
                .json()
                .map_err(|e| Error::Malformed(format!("listing of {what}: {e}")))?;
            // A record without id or name fails the whole listing.
            for record in page.value {
                entries.push(RemoteEntry::from_record(record)?);
            }
            // The link is absolute and already carries the skip token.
            next = match page.next_link {
                Some(link) => Some(
                    Url::parse(&link)
                        .map_err(|e| Error::Malformed(format!("next page link {link}: {e}")))?,
                ),
                None => None,
            };
        }
        Ok(entries)
    }

    /// GET `items/{id}`.
    fn get_metadata(&self, id: &str) -> Result<RemoteEntry> {
        let url = self.url(&["me", "drive", "items", id])?;
        let res = self.send(self.client.get(url), id)?;
        let record: Value = res
            .json()
            .map_err(|e| Error::Malformed(format!("metadata of {id}: {e}")))?;
        RemoteEntry::from_record(record)
    }

    /// GET `items/{id}/content`. Graph answers with a redirect to the
    /// download URL, which reqwest follows.
    fn download_content(&self, id: &str, local_path: &Path) -> Result<u64> {
        let url = self.url(&["me", "drive", "items", id, "content"])?;
        let mut res = self.send(self.client.get(url), id)?;
        // Create the file only once the server said yes, so a 404 leaves nothing behind.
        let mut file = File::create(local_path).map_err(|e| Error::local_io(local_path, e))?;
        // Streamed; the body is never held in memory as a whole.
        let written = res.copy_to(&mut file)?;
        Ok(written)
    }

    /// PUT `root:/{remote_path}:/content` with the file as the raw body.
    /// Graph creates missing parent folders and replaces an existing file.
    fn upload_content(&self, remote_path: &str, local_path: &Path) -> Result<RemoteEntry> {
        let file = File::open(local_path).map_err(|e| Error::local_io(local_path, e))?;
        let url = self.path_url(remote_path, "content")?;
        let req = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(Body::from(file));
        let res = self.send(req, remote_path)?;
        let record: Value = res
            .json()
            .map_err(|e| Error::Malformed(format!("upload response for {remote_path}: {e}")))?;
        RemoteEntry::from_record(record)
    }
}

/// Builds `GraphClient`s against one API base url.
#[derive(Clone, Debug)]
pub struct GraphConnector {
    base_url: String,
}

impl GraphConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        GraphConnector {
            base_url: base_url.into(),
        }
    }

    /// Use `ONEDRIVE_API_URL` when set, the public Graph endpoint otherwise.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("ONEDRIVE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        GraphConnector::new(base_url)
    }
}

impl Connector for GraphConnector {
    type Client = GraphClient;

    fn connect(&self, token: &str) -> Result<GraphClient> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::Auth("empty access token".into()));
        }
        let client = GraphClient::new(&self.base_url, token)?;
        // A token with no drive behind it is as useless as a rejected one.
        client.verify().map_err(|e| match e {
            Error::NotFound { .. } => Error::Auth("no drive is associated with this token".into()),
            other => other,
        })?;
        Ok(client)
    }
}
