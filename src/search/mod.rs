//! Tantivy-based search index module.
//!
//! Provides full-text search over the public site content (published blog
//! posts and courses, open jobs, events) with field boosting.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, BoostQuery, Occur, QueryParser};
use tantivy::schema::{Field, Schema, Value, STORED, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tokio::sync::RwLock;

use crate::db::Repository;
use crate::errors::AppError;
use crate::models::{BlogPost, Course, Event, Job};

/// Field boost values.
const BOOST_TITLE: f32 = 10.0;
const BOOST_SUMMARY: f32 = 6.0;
const BOOST_BODY: f32 = 3.0;

/// Kind of page a hit links to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Blog,
    Course,
    Job,
    Event,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Blog => "blog",
            SearchKind::Course => "course",
            SearchKind::Job => "job",
            SearchKind::Event => "event",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "blog" => Some(SearchKind::Blog),
            "course" => Some(SearchKind::Course),
            "job" => Some(SearchKind::Job),
            "event" => Some(SearchKind::Event),
            _ => None,
        }
    }
}

/// Text extracted from one piece of content.
#[derive(Debug, Clone)]
pub struct SearchDoc {
    pub kind: SearchKind,
    pub id: String,
    /// Public URL segment for blog posts
    pub slug: Option<String>,
    pub title: String,
    pub summary: String,
    pub body: String,
    /// When the page stops being public
    pub expires_at: Option<DateTime<Utc>>,
}

impl SearchDoc {
    pub fn from_blog(blog: &BlogPost) -> Self {
        Self {
            kind: SearchKind::Blog,
            id: blog.id.clone(),
            slug: Some(blog.slug.clone()),
            title: blog.title.clone(),
            summary: format!("{} {}", blog.summary.as_deref().unwrap_or(""), blog.author),
            body: blog.content.clone(),
            expires_at: None,
        }
    }

    pub fn from_course(course: &Course) -> Self {
        Self {
            kind: SearchKind::Course,
            id: course.id.clone(),
            slug: None,
            title: course.title.clone(),
            summary: format!(
                "{} {} {}",
                course.instructor,
                course.ceu_category.as_str(),
                course.format.as_str()
            ),
            body: course.description.clone(),
            expires_at: None,
        }
    }

    pub fn from_job(job: &Job) -> Self {
        Self {
            kind: SearchKind::Job,
            id: job.id.clone(),
            slug: None,
            title: job.title.clone(),
            summary: format!(
                "{} {} {}",
                job.organization,
                job.location,
                job.employment_type.as_str()
            ),
            body: job.description.clone(),
            expires_at: job.expires_at,
        }
    }

    pub fn from_event(event: &Event) -> Self {
        Self {
            kind: SearchKind::Event,
            id: event.id.clone(),
            slug: None,
            title: event.title.clone(),
            summary: event.location.clone(),
            body: event.description.clone(),
            expires_at: None,
        }
    }
}

/// One search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub kind: SearchKind,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    pub title: String,
    pub score: f32,
}

/// Search index schema fields.
struct SearchFields {
    kind: Field,
    id: Field,
    slug: Field,
    title: Field,
    summary: Field,
    body: Field,
}

/// Tantivy search index for site content.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    fields: SearchFields,
    /// Earliest expiry among indexed documents
    next_expiry: RwLock<Option<DateTime<Utc>>>,
}

impl SearchIndex {
    /// Create or open a search index at the specified path.
    pub fn open(index_path: &Path) -> Result<Self, AppError> {
        std::fs::create_dir_all(index_path)
            .map_err(|e| AppError::Search(format!("Failed to create index directory: {}", e)))?;

        let mut schema_builder = Schema::builder();
        let kind = schema_builder.add_text_field("kind", STORED);
        let id = schema_builder.add_text_field("id", STORED);
        let slug = schema_builder.add_text_field("slug", STORED);
        let title = schema_builder.add_text_field("title", TEXT | STORED);
        let summary = schema_builder.add_text_field("summary", TEXT);
        let body = schema_builder.add_text_field("body", TEXT);
        let schema = schema_builder.build();

        let fields = SearchFields {
            kind,
            id,
            slug,
            title,
            summary,
            body,
        };

        // An index written with another field layout is recreated empty.
        let index = match Index::open_in_dir(index_path) {
            Ok(existing) if same_layout(&existing.schema(), &schema) => Ok(existing),
            Ok(stale) => {
                drop(stale);
                tracing::info!("Search index layout changed, recreating {}", index_path.display());
                std::fs::remove_dir_all(index_path)
                    .and_then(|_| std::fs::create_dir_all(index_path))
                    .map_err(|e| AppError::Search(format!("Failed to reset index directory: {}", e)))?;
                Index::create_in_dir(index_path, schema.clone())
            }
            Err(_) => Index::create_in_dir(index_path, schema.clone()),
        }
        .map_err(|e| AppError::Search(format!("Failed to open/create index: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e| AppError::Search(format!("Failed to create reader: {}", e)))?;

        let writer = index
            .writer(50_000_000) // 50MB buffer
            .map_err(|e| AppError::Search(format!("Failed to create writer: {}", e)))?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            fields,
            next_expiry: RwLock::new(None),
        })
    }

    /// Replace the whole index with `docs`.
    pub async fn rebuild(&self, docs: &[SearchDoc]) -> Result<(), AppError> {
        let mut writer = self.writer.write().await;

        writer.delete_all_documents()?;
        for search_doc in docs {
            writer.add_document(self.create_document(search_doc))?;
        }
        writer.commit()?;

        self.reader.reload()?;
        *self.next_expiry.write().await = docs.iter().filter_map(|d| d.expires_at).min();

        tracing::info!("Search index rebuilt with {} documents", docs.len());
        Ok(())
    }

    /// Whether an indexed document has expired since the last rebuild.
    pub async fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.next_expiry
            .read()
            .await
            .map_or(false, |expiry| expiry <= now)
    }

    /// Search site content. Returns one page of hits and the total match count.
    pub fn search(
        &self,
        query_str: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<SearchHit>, usize), AppError> {
        if query_str.trim().is_empty() {
            return Ok((Vec::new(), 0));
        }

        let searcher = self.reader.searcher();

        // Parse once over all fields to reject malformed queries up front
        let query_parser = QueryParser::for_index(
            &self.index,
            vec![self.fields.title, self.fields.summary, self.fields.body],
        );
        let base_query = query_parser.parse_query(query_str)?;

        let mut subqueries: Vec<(Occur, Box<dyn tantivy::query::Query>)> = Vec::new();
        let field_queries = [
            (self.fields.title, BOOST_TITLE),
            (self.fields.summary, BOOST_SUMMARY),
            (self.fields.body, BOOST_BODY),
        ];
        for (field, boost) in field_queries {
            let field_parser = QueryParser::for_index(&self.index, vec![field]);
            if let Ok(field_query) = field_parser.parse_query(query_str) {
                subqueries.push((Occur::Should, Box::new(BoostQuery::new(field_query, boost))));
            }
        }

        let combined_query = if subqueries.is_empty() {
            base_query
        } else {
            Box::new(BooleanQuery::new(subqueries))
        };

        // Past the last document every page is empty.
        let offset = offset.min(searcher.num_docs() as usize);
        let (top_docs, total) = searcher
            .search(
                &combined_query,
                &(TopDocs::with_limit(limit.saturating_add(offset).max(1)), Count),
            )
            .map_err(|e| AppError::Search(format!("Search failed: {}", e)))?;

        let hits = top_docs
            .into_iter()
            .skip(offset)
            .take(limit)
            .filter_map(|(score, doc_address)| {
                let stored: TantivyDocument = searcher.doc(doc_address).ok()?;
                let text = |field: Field| {
                    stored
                        .get_first(field)
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                };
                Some(SearchHit {
                    kind: SearchKind::parse(&text(self.fields.kind)?)?,
                    id: text(self.fields.id)?,
                    slug: text(self.fields.slug),
                    title: text(self.fields.title)?,
                    score,
                })
            })
            .collect();

        Ok((hits, total))
    }

    fn create_document(&self, search_doc: &SearchDoc) -> TantivyDocument {
        let mut document = doc!(
            self.fields.kind => search_doc.kind.as_str(),
            self.fields.id => search_doc.id.clone(),
            self.fields.title => search_doc.title.clone(),
            self.fields.summary => search_doc.summary.clone(),
            self.fields.body => search_doc.body.clone()
        );
        if let Some(slug) = &search_doc.slug {
            document.add_text(self.fields.slug, slug);
        }
        document
    }
}

/// Same field names in the same order.
fn same_layout(existing: &Schema, wanted: &Schema) -> bool {
    existing
        .fields()
        .map(|(_, entry)| entry.name())
        .eq(wanted.fields().map(|(_, entry)| entry.name()))
}

/// Everything the public site shows at `now`.
pub async fn collect_documents(
    repo: &Repository,
    now: DateTime<Utc>,
) -> Result<Vec<SearchDoc>, AppError> {
    let mut docs = Vec::new();
    docs.extend(repo.list_blogs(true).await?.iter().map(SearchDoc::from_blog));
    docs.extend(repo.list_courses(true).await?.iter().map(SearchDoc::from_course));
    docs.extend(repo.list_jobs(Some(now)).await?.iter().map(SearchDoc::from_job));
    docs.extend(repo.list_events(None).await?.iter().map(SearchDoc::from_event));
    Ok(docs)
}

/// Rebuild the index from the database as of `now`.
pub async fn reindex(
    repo: &Repository,
    index: &SearchIndex,
    now: DateTime<Utc>,
) -> Result<usize, AppError> {
    let docs = collect_documents(repo, now).await?;
    index.rebuild(&docs).await?;
    Ok(docs.len())
}
