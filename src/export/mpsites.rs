//! `.mpsites` text encoding
//!
//! A `#` comment preamble, a header block of `# Key: Value` lines between two
//! `##` lines, then one line per site. Format 0 lines are
//! `date uses type:algorithm sitename<TAB>password`; format 1 lines are
//! `date uses type:algorithm:counter login<TAB>sitename<TAB>password`.

use crate::database::{PasswordType, SiteRecord};
use crate::error::{SiteStoreError, Result};
use crate::utils::{format_export_date, parse_export_date};
use crate::DEFAULT_GENERATION;
use super::{MpsitesDocument, MpsitesHeader};

pub(super) fn write(header: &MpsitesHeader, sites: &[SiteRecord], alg_min_version: u32) -> String {
    let date = format_export_date(&header.date_or_now());

    let mut lines = vec![
        "# Master Password site export".to_string(),
        "#     Export of site names and stored passwords (unless device-private) encrypted with the master key.".to_string(),
        "#".to_string(),
        "##".to_string(),
        "# Format: 1".to_string(),
        format!("# Date: {date}"),
        format!("# User Name: {}", header.username),
        format!("# Full Name: {}", header.username),
        "# Avatar: 0".to_string(),
        format!("# Key ID: {}", header.key_id),
        "# Version: 2.2".to_string(),
        format!("# Algorithm: {}", header.algorithm),
        format!("# Default Type: {}", header.default_type.template_code()),
        "# Passwords: PROTECTED".to_string(),
        "##".to_string(),
        "#".to_string(),
        "#               Last     Times  Password                      Login\t                     Site\tSite".to_string(),
        "#               used      used      type                       name\t                     name\tpassword".to_string(),
    ];

    lines.extend(sites.iter().map(|site| {
        let kind = format!(
            "{}:{}:{}",
            site.password_type.template_code(),
            site.required_alg_version(alg_min_version),
            site.generation
        );
        format!(
            "{date}  {:>8}  {kind:>8}  {:>25}\t{:>25}\t",
            0, site.username, site.sitename
        )
    }));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub(super) fn read(data: &str) -> Result<MpsitesDocument> {
    let mut header = MpsitesHeader::default();
    let mut format: Option<u32> = None;
    let mut in_header = false;
    let mut sites = Vec::new();

    for (n, line) in data.lines().enumerate() {
        let lineno = n + 1;
        let line = line.trim_end_matches('\r');

        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with("##") {
            in_header = !in_header;
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            if in_header {
                if let Some((key, value)) = comment.split_once(':') {
                    apply_header(&mut header, &mut format, key.trim(), value.trim(), lineno)?;
                }
            }
            continue;
        }

        let Some(format) = format else {
            return Err(SiteStoreError::ImportFormat(format!(
                "line {lineno}: site entry before a Format header"
            )));
        };
        sites.push(parse_site(line, format, lineno)?);
    }

    match format {
        Some(format) => {
            header.format = format;
            Ok(MpsitesDocument { header, sites })
        }
        None => Err(SiteStoreError::ImportFormat("missing Format header".to_string())),
    }
}

fn apply_header(
    header: &mut MpsitesHeader,
    format: &mut Option<u32>,
    key: &str,
    value: &str,
    lineno: usize,
) -> Result<()> {
    match key {
        "Format" => {
            let version = parse_number(value, "Format", lineno)?;
            if version > 1 {
                return Err(SiteStoreError::ImportFormat(format!(
                    "line {lineno}: unsupported export format {version}"
                )));
            }
            *format = Some(version);
        }
        "Date" => header.date = parse_export_date(value),
        "User Name" => header.username = value.to_string(),
        "Full Name" if header.username.is_empty() => header.username = value.to_string(),
        "Key ID" => header.key_id = value.to_string(),
        "Algorithm" => header.algorithm = parse_number(value, "Algorithm", lineno)?,
        "Default Type" => {
            let code = parse_number(value, "Default Type", lineno)?;
            header.default_type = template(code, lineno)?;
        }
        _ => {}
    }
    Ok(())
}

fn parse_site(line: &str, format: u32, lineno: usize) -> Result<SiteRecord> {
    let malformed = || SiteStoreError::ImportFormat(format!("line {lineno}: malformed site entry"));

    let mut columns = line.split('\t');
    let head = columns.next().ok_or_else(malformed)?;

    let (_date, rest) = next_token(head).ok_or_else(malformed)?;
    let (_uses, rest) = next_token(rest).ok_or_else(malformed)?;
    let (kind, rest) = next_token(rest).ok_or_else(malformed)?;

    let (username, sitename) = if format == 0 {
        (String::new(), rest.trim())
    } else {
        let sitename = columns.next().ok_or_else(malformed)?;
        (rest.trim().to_string(), sitename.trim())
    };
    if sitename.is_empty() {
        return Err(malformed());
    }

    let mut parts = kind.split(':');
    let code = parse_number(parts.next().unwrap_or(""), "type", lineno)?;
    let passalgo = match parts.next() {
        Some(value) => parse_number(value, "algorithm", lineno)?,
        None => return Err(malformed()),
    };
    let generation = match parts.next() {
        Some(value) => parse_number(value, "counter", lineno)?,
        None => DEFAULT_GENERATION,
    };

    let mut site = SiteRecord::new(sitename, "");
    site.password_type = template(code, lineno)?;
    site.generation = generation;
    site.username = username;
    site.passalgo = passalgo;
    Ok(site)
}

/// Next whitespace-delimited token and the unconsumed remainder
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    match s.find(char::is_whitespace) {
        Some(i) => Some((&s[..i], &s[i..])),
        None => Some((s, "")),
    }
}

fn parse_number(value: &str, what: &str, lineno: usize) -> Result<u32> {
    value.trim().parse().map_err(|_| {
        SiteStoreError::ImportFormat(format!("line {lineno}: invalid {what} '{value}'"))
    })
}

fn template(code: u32, lineno: usize) -> Result<PasswordType> {
    PasswordType::from_template_code(code).map_err(|_| {
        SiteStoreError::ImportFormat(format!("line {lineno}: unsupported password type {code}"))
    })
}
