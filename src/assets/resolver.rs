//! Asset download and map construction

use super::extract::{extract_from_css, extract_from_html, AssetReference};
use super::naming::AssetNamer;
use super::{AssetKind, AssetMap, StoredAsset, CONSOLIDATED_STYLESHEET};
use crate::crawler::Page;
use crate::output::stats::AssetCounts;
use crate::output::JobLog;
use crate::transport::Transport;
use crate::url::{strip_query_and_fragment, CanonicalUrl, Canonicalizer};
use std::collections::{HashMap, VecDeque};

/// `@import` chains are followed this many levels below a linked stylesheet
const MAX_IMPORT_DEPTH: usize = 3;

/// A downloaded stylesheet, still referencing remote URLs
#[derive(Debug, Clone)]
pub struct FetchedStylesheet {
    pub url: CanonicalUrl,
    pub css: String,
}

/// The deduplicated set of assets a job will download
///
/// Built from every crawled page before any download starts. Each dedup key
/// (the URL without query and fragment) appears once; every exact spelling
/// seen for it is remembered so the map can answer all of them.
#[derive(Debug, Default)]
pub struct AssetPlan {
    references: Vec<AssetReference>,
    spellings: HashMap<String, Vec<String>>,
}

impl AssetPlan {
    /// Extracts the assets of every page
    pub fn from_pages(pages: &[Page], canonicalizer: &Canonicalizer) -> Self {
        let mut plan = Self::default();
        for page in pages {
            for reference in extract_from_html(&page.html, page.url.as_url(), canonicalizer) {
                plan.add(reference);
            }
        }
        plan
    }

    /// Adds a reference
    ///
    /// # Returns
    ///
    /// `true` if its dedup key was new
    pub fn add(&mut self, reference: AssetReference) -> bool {
        let key = strip_query_and_fragment(reference.url.as_str());
        let exact = reference.url.as_str().to_string();

        match self.spellings.get_mut(&key) {
            Some(spellings) => {
                if !spellings.contains(&exact) {
                    spellings.push(exact);
                }
                false
            }
            None => {
                self.spellings.insert(key, vec![exact]);
                self.references.push(reference);
                true
            }
        }
    }

    pub fn of_kind(&self, kind: AssetKind) -> Vec<&AssetReference> {
        self.references.iter().filter(|r| r.kind == kind).collect()
    }

    pub fn count(&self, kind: AssetKind) -> usize {
        self.references.iter().filter(|r| r.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    fn spellings_of(&self, url: &CanonicalUrl) -> Vec<String> {
        self.spellings
            .get(&strip_query_and_fragment(url.as_str()))
            .cloned()
            .unwrap_or_else(|| vec![url.as_str().to_string()])
    }
}

/// Downloads the assets of a plan, one at a time, and builds the [`AssetMap`]
///
/// A failed download is logged and leaves its URL out of the map, so the
/// rewriters keep the remote reference for that one resource.
pub struct AssetResolver<'a> {
    transport: &'a dyn Transport,
    canonicalizer: &'a Canonicalizer,
    namer: AssetNamer,
    map: AssetMap,
    stored: Vec<StoredAsset>,
    stylesheets: Vec<FetchedStylesheet>,
    log: JobLog,
}

impl<'a> AssetResolver<'a> {
    pub fn new(transport: &'a dyn Transport, canonicalizer: &'a Canonicalizer, log: JobLog) -> Self {
        Self {
            transport,
            canonicalizer,
            namer: AssetNamer::new(),
            map: AssetMap::new(),
            stored: Vec::new(),
            stylesheets: Vec::new(),
            log,
        }
    }

    /// Fetches every stylesheet of the plan and the stylesheets they import
    ///
    /// Images and fonts referenced by the stylesheets are added to `plan`.
    /// Every stylesheet maps to the consolidated stylesheet, which holds the
    /// content of all of them in discovery order.
    pub async fn fetch_stylesheets(&mut self, plan: &mut AssetPlan) -> AssetCounts {
        let mut counts = AssetCounts::default();
        let mut queue: VecDeque<(CanonicalUrl, usize)> = plan
            .of_kind(AssetKind::Stylesheet)
            .into_iter()
            .map(|r| (r.url.clone(), 0))
            .collect();

        while let Some((url, depth)) = queue.pop_front() {
            let response = match self.transport.fetch_text(url.as_str()).await {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    self.fail(&mut counts, AssetKind::Stylesheet, &url, &format!("HTTP {}", response.status));
                    continue;
                }
                Err(e) => {
                    self.fail(&mut counts, AssetKind::Stylesheet, &url, &e.to_string());
                    continue;
                }
            };

            let found = extract_from_css(&response.body, url.as_url(), self.canonicalizer);
            for import in found.imports {
                let reference = AssetReference {
                    url: import.clone(),
                    kind: AssetKind::Stylesheet,
                };
                if depth < MAX_IMPORT_DEPTH && plan.add(reference) {
                    queue.push_back((import, depth + 1));
                }
            }
            for reference in found.assets {
                plan.add(reference);
            }

            for spelling in plan.spellings_of(&url) {
                self.map
                    .insert(&spelling, CONSOLIDATED_STYLESHEET, AssetKind::Stylesheet);
            }
            self.stylesheets.push(FetchedStylesheet {
                url,
                css: response.body,
            });
            counts.downloaded += 1;
        }

        tracing::info!(
            "Stylesheets: {} fetched, {} failed",
            counts.downloaded,
            counts.failed
        );
        counts
    }

    /// Downloads every planned asset of `kind`
    pub async fn download(&mut self, kind: AssetKind, plan: &AssetPlan) -> AssetCounts {
        let mut counts = AssetCounts::default();

        for reference in plan.of_kind(kind) {
            let url = &reference.url;
            let response = match self.transport.fetch_bytes(url.as_str()).await {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    self.fail(&mut counts, kind, url, &format!("HTTP {}", response.status));
                    continue;
                }
                Err(e) => {
                    self.fail(&mut counts, kind, url, &e.to_string());
                    continue;
                }
            };

            let local_path =
                self.namer
                    .assign(url.as_url(), kind, response.content_type.as_deref());
            for spelling in plan.spellings_of(url) {
                self.map.insert(&spelling, &local_path, kind);
            }
            tracing::trace!("{} -> {}", url, local_path);

            self.stored.push(StoredAsset {
                url: url.to_string(),
                kind,
                local_path,
                bytes: response.bytes,
            });
            counts.downloaded += 1;
        }

        tracing::info!(
            "{}s: {} downloaded, {} failed",
            kind,
            counts.downloaded,
            counts.failed
        );
        counts
    }

    pub fn map(&self) -> &AssetMap {
        &self.map
    }

    pub fn stylesheets(&self) -> &[FetchedStylesheet] {
        &self.stylesheets
    }

    /// Hands out the finished map, the downloaded bodies and the stylesheets
    pub fn into_parts(self) -> (AssetMap, Vec<StoredAsset>, Vec<FetchedStylesheet>) {
        (self.map, self.stored, self.stylesheets)
    }

    fn fail(&self, counts: &mut AssetCounts, kind: AssetKind, url: &CanonicalUrl, reason: &str) {
        tracing::warn!("Failed to fetch {} {}: {}", kind, url, reason);
        self.log.warn(format!("Failed to fetch {kind} {url}: {reason}"));
        counts.failed += 1;
    }
}
