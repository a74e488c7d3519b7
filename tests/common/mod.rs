//! Fixtures shared by the integration tests: report XML, archives, MIME mails
//! and a deterministic resolver.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use dmarc_analyse::dns::HostnameResolver;
use dmarc_analyse::DmarcError;
use flate2::write::GzEncoder;
use flate2::Compression;
use zip::write::SimpleFileOptions;

/// Resolves only the addresses it was given.
pub struct StaticResolver(pub HashMap<String, String>);

impl StaticResolver {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        StaticResolver(
            entries
                .iter()
                .map(|(ip, host)| (ip.to_string(), host.to_string()))
                .collect(),
        )
    }
}

impl HostnameResolver for StaticResolver {
    async fn reverse_lookup(&self, ip: &str) -> dmarc_analyse::Result<String> {
        self.0
            .get(ip)
            .cloned()
            .ok_or_else(|| DmarcError::Dns(format!("NXDOMAIN for {}", ip)))
    }
}

pub struct Row<'a> {
    pub ip: &'a str,
    pub count: u64,
    pub dkim: &'a str,
    pub spf: &'a str,
}

/// A DMARC aggregate report; `report_id: None` leaves the element out.
pub fn report_xml(org: &str, report_id: Option<&str>, domain: &str, rows: &[Row]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<feedback>\n");
    xml.push_str("  <report_metadata>\n");
    xml.push_str(&format!("    <org_name>{}</org_name>\n", org));
    xml.push_str("    <email>noreply-dmarc@provider.example</email>\n");
    if let Some(id) = report_id {
        xml.push_str(&format!("    <report_id>{}</report_id>\n", id));
    }
    xml.push_str("    <date_range><begin>1700006400</begin><end>1700092799</end></date_range>\n");
    xml.push_str("  </report_metadata>\n");
    xml.push_str(&format!(
        "  <policy_published><domain>{}</domain><adkim>r</adkim><aspf>r</aspf><p>none</p><pct>100</pct></policy_published>\n",
        domain
    ));
    for row in rows {
        let disposition = if row.dkim == "pass" && row.spf == "pass" { "none" } else { "quarantine" };
        xml.push_str(&format!(
            "  <record>\n    <row>\n      <source_ip>{ip}</source_ip>\n      <count>{count}</count>\n      \
             <policy_evaluated><disposition>{disposition}</disposition><dkim>{dkim}</dkim><spf>{spf}</spf></policy_evaluated>\n    </row>\n    \
             <identifiers><header_from>{domain}</header_from></identifiers>\n    \
             <auth_results><dkim><domain>{domain}</domain><result>{dkim}</result></dkim><spf><domain>{domain}</domain><result>{spf}</result></spf></auth_results>\n  </record>\n",
            ip = row.ip,
            count = row.count,
            disposition = disposition,
            dkim = row.dkim,
            spf = row.spf,
            domain = domain,
        ));
    }
    xml.push_str("</feedback>\n");
    xml
}

pub fn zip_bytes(entry_name: &str, data: &[u8]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file(entry_name, SimpleFileOptions::default()).unwrap();
    zip.write_all(data).unwrap();
    zip.finish().unwrap().into_inner()
}

pub fn gzip_bytes(data: &[u8]) -> Vec<u8> {
    let mut gz = GzEncoder::new(Vec::new(), Compression::default());
    gz.write_all(data).unwrap();
    gz.finish().unwrap()
}

pub struct Attachment<'a> {
    pub filename: &'a str,
    pub content_type: &'a str,
    pub data: &'a [u8],
}

/// A multipart/mixed report mail carrying the given base64 attachments.
pub fn mime_message(attachments: &[Attachment]) -> Vec<u8> {
    let mut mail = String::new();
    mail.push_str("From: noreply-dmarc@provider.example\r\n");
    mail.push_str("To: dmarc@example.com\r\n");
    mail.push_str("Subject: Report Domain: example.com\r\n");
    mail.push_str("MIME-Version: 1.0\r\n");
    mail.push_str("Content-Type: multipart/mixed; boundary=\"=_boundary\"\r\n\r\n");
    mail.push_str("--=_boundary\r\n");
    mail.push_str("Content-Type: text/plain; charset=us-ascii\r\n\r\n");
    mail.push_str("This is a DMARC aggregate report.\r\n");
    for attachment in attachments {
        mail.push_str("--=_boundary\r\n");
        mail.push_str(&format!(
            "Content-Type: {}; name=\"{}\"\r\n",
            attachment.content_type, attachment.filename
        ));
        mail.push_str("Content-Transfer-Encoding: base64\r\n");
        mail.push_str(&format!(
            "Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
            attachment.filename
        ));
        let encoded = STANDARD.encode(attachment.data);
        for chunk in encoded.as_bytes().chunks(76) {
            mail.push_str(std::str::from_utf8(chunk).unwrap());
            mail.push_str("\r\n");
        }
    }
    mail.push_str("--=_boundary--\r\n");
    mail.into_bytes()
}
