//! RSS 2.0 feed built from the report archive.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Asia::Taipei;
use chrono_tz::Tz;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::{debug, info, instrument};

use crate::core::feed::format_description;
use crate::core::report::{DATE_FORMAT, ReportHeader};
use crate::io::config::FeedConfig;
use crate::io::report_store::{read_report_header, report_files};

pub const FEED_FILE: &str = "feed.xml";
const GENERATOR: &str = "security-weekly RSS Generator";

/// A report ready to become a feed item.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub report_id: String,
    pub published: NaiveDate,
    pub header: ReportHeader,
}

/// What `generate_feed` wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSummary {
    pub path: PathBuf,
    pub reports_found: usize,
    pub items: usize,
    pub bytes: u64,
}

/// Load every report in `reports_dir`, newest `publish_date` first.
pub fn load_entries(reports_dir: &Path) -> Result<Vec<FeedEntry>> {
    let mut entries = Vec::new();
    for path in report_files(reports_dir)? {
        let header = read_report_header(&path)?;
        let published = NaiveDate::parse_from_str(&header.publish_date, DATE_FORMAT)
            .with_context(|| {
                format!(
                    "{}: invalid publish_date {:?}",
                    path.display(),
                    header.publish_date
                )
            })?;
        let report_id = if header.report_id.is_empty() {
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            header.report_id.clone()
        };
        entries.push(FeedEntry {
            report_id,
            published,
            header,
        });
    }
    entries.sort_by(|a, b| b.published.cmp(&a.published));
    Ok(entries)
}

/// Render the feed document.
pub fn render_feed(
    entries: &[FeedEntry],
    config: &FeedConfig,
    build_date: DateTime<Tz>,
) -> Result<String> {
    let site = config.site_url.trim_end_matches('/');
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("write xml declaration")?;
    let rss = BytesStart::new("rss").with_attributes([
        ("version", "2.0"),
        ("xmlns:atom", "http://www.w3.org/2005/Atom"),
    ]);
    writer.write_event(Event::Start(rss)).context("write rss")?;
    writer
        .write_event(Event::Start(BytesStart::new("channel")))
        .context("write channel")?;

    text_element(&mut writer, "title", &config.title)?;
    text_element(&mut writer, "link", &format!("{site}/"))?;
    text_element(&mut writer, "description", &config.description)?;
    text_element(&mut writer, "language", "zh-TW")?;
    let feed_url = format!("{site}/{FEED_FILE}");
    writer
        .create_element("atom:link")
        .with_attribute(("href", feed_url.as_str()))
        .with_attribute(("rel", "self"))
        .with_attribute(("type", "application/rss+xml"))
        .write_empty()
        .context("write atom:link")?;
    text_element(&mut writer, "lastBuildDate", &build_date.to_rfc2822())?;
    text_element(&mut writer, "generator", GENERATOR)?;

    for entry in entries {
        let published = taipei_midnight(entry.published)?;
        writer
            .write_event(Event::Start(BytesStart::new("item")))
            .context("write item")?;
        text_element(&mut writer, "title", &entry.header.title)?;
        text_element(
            &mut writer,
            "link",
            &format!("{site}/reports/{}.html", entry.report_id),
        )?;
        writer
            .create_element("guid")
            .with_attribute(("isPermaLink", "false"))
            .write_text_content(BytesText::new(&entry.report_id))
            .context("write guid")?;
        text_element(&mut writer, "pubDate", &published.to_rfc2822())?;
        text_element(
            &mut writer,
            "description",
            &format_description(&entry.header),
        )?;
        writer
            .write_event(Event::End(BytesEnd::new("item")))
            .context("close item")?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("channel")))
        .context("close channel")?;
    writer
        .write_event(Event::End(BytesEnd::new("rss")))
        .context("close rss")?;

    let mut xml = String::from_utf8(writer.into_inner()).context("feed is not utf-8")?;
    xml.push('\n');
    Ok(xml)
}

fn text_element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    writer
        .create_element(name)
        .write_text_content(BytesText::new(text))
        .with_context(|| format!("write {name}"))?;
    Ok(())
}

fn taipei_midnight(date: NaiveDate) -> Result<DateTime<Tz>> {
    date.and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(Taipei).single())
        .with_context(|| format!("{date} has no single Asia/Taipei midnight"))
}

/// Write `<output_dir>/feed.xml` from the newest `max_items` reports.
#[instrument(skip_all, fields(reports_dir = %reports_dir.display()))]
pub fn generate_feed(reports_dir: &Path, config: &FeedConfig) -> Result<FeedSummary> {
    let mut entries = load_entries(reports_dir)?;
    if entries.is_empty() {
        bail!(
            "no reports found: {}/SEC-WEEKLY-*.json",
            reports_dir.display()
        );
    }
    let reports_found = entries.len();
    entries.truncate(config.max_items);
    debug!(reports_found, items = entries.len(), "feed entries selected");

    let build_date = Utc::now().with_timezone(&Taipei);
    let xml = render_feed(&entries, config, build_date)?;

    fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("create {}", config.output_dir.display()))?;
    let path = config.output_dir.join(FEED_FILE);
    fs::write(&path, &xml).with_context(|| format!("write {}", path.display()))?;
    info!(path = %path.display(), items = entries.len(), "feed written");

    Ok(FeedSummary {
        path,
        reports_found,
        items: entries.len(),
        bytes: xml.len() as u64,
    })
}
