use super::{Document, DocumentStore, MetadataFields};
use crate::config::Config;
use crate::util::{now_rfc3339, pdf_date_now};
use anyhow::{anyhow, Context, Result};
use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream, StringFormat};
use quick_xml::escape::escape;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Opens PDFs with lopdf.
#[derive(Debug, Clone)]
pub struct LopdfStore {
    write_xmp: bool,
}

impl LopdfStore {
    pub fn new(cfg: &Config) -> Self {
        Self {
            write_xmp: cfg.metadata.write_xmp,
        }
    }
}

impl DocumentStore for LopdfStore {
    type Doc = LopdfDocument;

    fn open(&self, path: &Path) -> Result<LopdfDocument> {
        let doc = lopdf::Document::load(path)
            .with_context(|| format!("opening PDF: {}", path.display()))?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(anyhow!("encrypted PDF is not supported: {}", path.display()));
        }
        Ok(LopdfDocument {
            doc,
            source: path.to_path_buf(),
            write_xmp: self.write_xmp,
        })
    }
}

pub struct LopdfDocument {
    doc: lopdf::Document,
    source: PathBuf,
    write_xmp: bool,
}

impl LopdfDocument {
    /// Starts a metadata edit. Nothing reaches the document until [`MetadataTransaction::commit`].
    pub fn begin_metadata(&mut self) -> MetadataTransaction<'_> {
        MetadataTransaction {
            doc: &mut self.doc,
            write_xmp: self.write_xmp,
            title: None,
            description: None,
            subject: None,
            committed: false,
        }
    }

    /// Reads a text entry (e.g. `Title`) from the document information dictionary.
    pub fn info_field(&self, key: &str) -> Option<String> {
        let info = match self.doc.trailer.get(b"Info").ok()? {
            Object::Reference(id) => self.doc.get_object(*id).ok()?.as_dict().ok()?,
            Object::Dictionary(d) => d,
            _ => return None,
        };
        match info.get(key.as_bytes()).ok()? {
            Object::String(bytes, _) => Some(decode_text_string(bytes)),
            _ => None,
        }
    }

    /// The catalog's XMP packet, if any.
    pub fn xmp_packet(&self) -> Option<String> {
        let root = self.doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
        let catalog = self.doc.get_object(root).ok()?.as_dict().ok()?;
        let meta_id = catalog.get(b"Metadata").ok()?.as_reference().ok()?;
        let stream = self.doc.get_object(meta_id).ok()?.as_stream().ok()?;
        let bytes = if stream.dict.get(b"Filter").is_ok() {
            stream.decompressed_content().ok()?
        } else {
            stream.content.clone()
        };
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Document for LopdfDocument {
    fn write_metadata(&mut self, fields: &MetadataFields) -> Result<()> {
        let source = self.source.display().to_string();
        let mut tx = self.begin_metadata();
        tx.set_title(&fields.title);
        tx.set_description(&fields.description);
        tx.set_subject(&fields.subject);
        tx.commit()
            .with_context(|| format!("writing metadata: {source}"))
    }

    fn save_as(&mut self, dest: &Path) -> Result<()> {
        let partial = partial_path(dest)?;
        self.doc
            .save(&partial)
            .with_context(|| format!("saving PDF: {}", partial.display()))?;
        if let Err(err) = std::fs::rename(&partial, dest) {
            let _ = std::fs::remove_file(&partial);
            return Err(err).with_context(|| format!("renaming onto {}", dest.display()));
        }
        Ok(())
    }
}

/// Staged metadata edit over an open document.
///
/// Dropping the transaction without calling `commit` leaves the document as it was.
pub struct MetadataTransaction<'a> {
    doc: &'a mut lopdf::Document,
    write_xmp: bool,
    title: Option<String>,
    description: Option<String>,
    subject: Option<String>,
    committed: bool,
}

impl MetadataTransaction<'_> {
    pub fn set_title(&mut self, value: &str) {
        self.title = Some(value.to_string());
    }

    pub fn set_description(&mut self, value: &str) {
        self.description = Some(value.to_string());
    }

    pub fn set_subject(&mut self, value: &str) {
        self.subject = Some(value.to_string());
    }

    pub fn commit(mut self) -> Result<()> {
        // Resolve everything fallible before touching the document.
        let info_id = match self.doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        let inline_info = match self.doc.trailer.get(b"Info") {
            Ok(Object::Dictionary(d)) => d.clone(),
            _ => Dictionary::new(),
        };
        if let Some(id) = info_id {
            self.doc
                .get_object(id)
                .and_then(Object::as_dict)
                .map_err(|e| anyhow!("document info is not a dictionary: {e}"))?;
        }
        let xmp_target = if self.write_xmp {
            let root = self
                .doc
                .trailer
                .get(b"Root")
                .and_then(Object::as_reference)
                .map_err(|e| anyhow!("document has no catalog: {e}"))?;
            let existing = self
                .doc
                .get_object(root)
                .and_then(Object::as_dict)
                .map_err(|e| anyhow!("catalog is not a dictionary: {e}"))?
                .get(b"Metadata")
                .and_then(Object::as_reference)
                .ok();
            Some((root, existing))
        } else {
            None
        };

        let staged = self.staged_info();
        match info_id {
            Some(id) => {
                let info = self
                    .doc
                    .get_object_mut(id)
                    .and_then(Object::as_dict_mut)
                    .map_err(|e| anyhow!("document info is not a dictionary: {e}"))?;
                for (k, v) in staged.iter() {
                    info.set(k.clone(), v.clone());
                }
            }
            None => {
                let mut info = inline_info;
                for (k, v) in staged.iter() {
                    info.set(k.clone(), v.clone());
                }
                let id = self.doc.add_object(info);
                self.doc.trailer.set("Info", id);
            }
        }

        if let Some((root, existing)) = xmp_target {
            let packet = xmp_packet(
                self.title.as_deref(),
                self.description.as_deref(),
                self.subject.as_deref(),
                &now_rfc3339(),
            );
            self.install_xmp(root, existing, packet)?;
        }

        self.committed = true;
        Ok(())
    }

    fn staged_info(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        if let Some(v) = &self.title {
            dict.set("Title", text_string(v));
        }
        if let Some(v) = &self.description {
            dict.set("Subject", text_string(v));
        }
        if let Some(v) = &self.subject {
            dict.set("Keywords", text_string(v));
        }
        dict.set("ModDate", text_string(&pdf_date_now()));
        dict
    }

    fn install_xmp(&mut self, root: ObjectId, existing: Option<ObjectId>, packet: String) -> Result<()> {
        let stream = Stream::new(
            dictionary! {
                "Type" => "Metadata",
                "Subtype" => "XML",
            },
            packet.into_bytes(),
        )
        .with_compression(false);

        match existing {
            Some(id) => {
                self.doc.objects.insert(id, Object::Stream(stream));
            }
            None => {
                let id = self.doc.add_object(stream);
                self.doc
                    .get_object_mut(root)
                    .and_then(Object::as_dict_mut)
                    .map_err(|e| anyhow!("catalog is not a dictionary: {e}"))?
                    .set("Metadata", id);
            }
        }
        Ok(())
    }
}

impl Drop for MetadataTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!("discarding uncommitted metadata edit");
        }
    }
}

fn partial_path(dest: &Path) -> Result<PathBuf> {
    let name = dest
        .file_name()
        .ok_or_else(|| anyhow!("destination has no file name: {}", dest.display()))?;
    let parent = dest.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!(".{}.partial", name.to_string_lossy())))
}

/// PDF text string: plain bytes for ASCII, UTF-16BE with BOM otherwise.
pub fn text_string(s: &str) -> Object {
    if s.is_ascii() {
        return Object::String(s.as_bytes().to_vec(), StringFormat::Literal);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in s.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

pub fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn xmp_packet(
    title: Option<&str>,
    description: Option<&str>,
    subject: Option<&str>,
    metadata_date: &str,
) -> String {
    let mut props = String::new();
    if let Some(t) = title {
        props.push_str(&format!(
            "   <dc:title><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:title>\n",
            escape(t)
        ));
    }
    if let Some(d) = description {
        props.push_str(&format!(
            "   <dc:description><rdf:Alt><rdf:li xml:lang=\"x-default\">{}</rdf:li></rdf:Alt></dc:description>\n",
            escape(d)
        ));
    }
    if let Some(s) = subject {
        props.push_str(&format!(
            "   <dc:subject><rdf:Bag><rdf:li>{0}</rdf:li></rdf:Bag></dc:subject>\n   <pdf:Keywords>{0}</pdf:Keywords>\n",
            escape(s)
        ));
    }
    props.push_str(&format!(
        "   <xmp:MetadataDate>{}</xmp:MetadataDate>\n",
        escape(metadata_date)
    ));

    format!(
        "<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n\
         <x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n\
         <rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\">\n\
         <rdf:Description rdf:about=\"\" \
         xmlns:dc=\"http://purl.org/dc/elements/1.1/\" \
         xmlns:pdf=\"http://ns.adobe.com/pdf/1.3/\" \
         xmlns:xmp=\"http://ns.adobe.com/xap/1.0/\">\n\
         {props}\
         </rdf:Description>\n\
         </rdf:RDF>\n\
         </x:xmpmeta>\n\
         <?xpacket end=\"w\"?>"
    )
}
