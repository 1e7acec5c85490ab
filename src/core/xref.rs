use super::base_stream::BaseStream;
use super::decode::{self, DecodedStream};
use super::error::{PDFError, PDFResult};
use super::lexer::Lexer;
use super::parser::{Dict, PDFObject, Parser};
use super::stream::Stream;
use lru::LruCache;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// Longest chain of reference-to-reference hops followed in one resolution.
const MAX_REFERENCE_DEPTH: usize = 64;

/// Decoded object streams kept around for compressed object lookups.
const OBJECT_STREAM_CACHE_SIZE: usize = 32;

/// Cross-reference table entry.
///
/// Each entry describes where to find an indirect object in the file.
#[derive(Debug, Clone, PartialEq)]
pub enum XRefEntry {
    /// Free entry - object number is available for reuse
    Free { next_free: u64, generation: u32 },

    /// Uncompressed entry - object is stored uncompressed at given offset
    Uncompressed { offset: u64, generation: u32 },

    /// Compressed entry - object is stored in an object stream
    Compressed { obj_stream_num: u32, index: u32 },
}

impl XRefEntry {
    /// Returns true if this entry is free.
    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }

    /// Returns the generation number for this entry.
    pub fn generation(&self) -> u32 {
        match self {
            XRefEntry::Free { generation, .. } => *generation,
            XRefEntry::Uncompressed { generation, .. } => *generation,
            XRefEntry::Compressed { .. } => 0,
        }
    }
}

/// Resolution counters, observable from tests and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XRefStats {
    /// Objects parsed from the file (cache misses)
    pub parsed: usize,
    /// Resolutions answered from the memo cache
    pub cache_hits: usize,
}

/// Objects of one decoded `/Type /ObjStm` stream, in index order.
#[derive(Debug)]
struct ObjectStream {
    objects: Vec<(u32, PDFObject)>,
}

/// Cross-reference table and indirect object resolver.
///
/// Maps object numbers to their locations and resolves references lazily.
/// Successful resolutions are memoized in a read-mostly cache, so the table
/// can be shared by reference between page workers.
pub struct XRef {
    /// Whole-document bytes
    stream: Stream,

    /// The entries in the xref table, indexed by object number
    entries: Vec<Option<XRefEntry>>,

    /// Merged trailer dictionary (newest section wins)
    trailer: Dict,

    /// Memoized resolutions keyed by (number, generation)
    cache: RwLock<FxHashMap<(u32, u32), PDFObject>>,

    /// Decoded object streams
    object_streams: Mutex<LruCache<u32, Arc<ObjectStream>>>,

    parsed: AtomicUsize,
    cache_hits: AtomicUsize,

    /// Decoded-size limit applied to every stream this table decodes
    max_decoded_bytes: usize,
}

impl XRef {
    /// Creates an empty table over the document bytes.
    pub fn new(stream: Stream, max_decoded_bytes: usize) -> Self {
        XRef {
            stream,
            entries: Vec::new(),
            trailer: Dict::default(),
            cache: RwLock::new(FxHashMap::default()),
            object_streams: Mutex::new(LruCache::new(
                NonZeroUsize::new(OBJECT_STREAM_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN),
            )),
            parsed: AtomicUsize::new(0),
            cache_hits: AtomicUsize::new(0),
            max_decoded_bytes,
        }
    }

    /// Reads every cross-reference section reachable from `startxref`.
    ///
    /// Sections are visited newest first (`/XRefStm`, then `/Prev`), and an
    /// entry is only recorded if no newer section defined it.
    ///
    /// Example table section:
    /// ```text
    /// xref
    /// 0 3
    /// 0000000000 65535 f
    /// 0000000015 00000 n
    /// 0000000079 00000 n
    /// trailer
    /// << /Size 3 /Root 1 0 R >>
    /// ```
    pub fn parse(&mut self, startxref: usize) -> PDFResult<()> {
        let mut queue = VecDeque::from([startxref]);
        let mut visited = FxHashSet::default();

        while let Some(offset) = queue.pop_front() {
            if !visited.insert(offset) {
                return Err(PDFError::MalformedXref(format!(
                    "cross-reference section at offset {} visited twice",
                    offset
                )));
            }

            let section_trailer = self.read_section(offset)?;
            log::debug!(
                "Read xref section at {} ({} entries so far)",
                offset,
                self.entries.len()
            );

            if let Some(stm) = section_trailer.get("XRefStm").and_then(PDFObject::as_usize) {
                queue.push_back(stm);
            }
            if let Some(prev) = section_trailer.get("Prev").and_then(PDFObject::as_usize) {
                queue.push_back(prev);
            }

            for (key, value) in section_trailer {
                if !matches!(key.as_str(), "Prev" | "XRefStm") {
                    self.trailer.entry(key).or_insert(value);
                }
            }
        }

        if let Some(size) = self.trailer.get("Size").and_then(PDFObject::as_usize) {
            if size != self.entries.len() {
                log::debug!(
                    "Trailer /Size is {}, table covers {} objects",
                    size,
                    self.entries.len()
                );
            }
        }

        Ok(())
    }

    fn parser_at<'p>(&self, offset: usize) -> PDFResult<Parser<'p>> {
        if offset >= self.stream.length() {
            return Err(PDFError::MalformedXref(format!(
                "offset {} beyond end of file ({} bytes)",
                offset,
                self.stream.length()
            )));
        }
        let sub = self
            .stream
            .make_sub_stream(offset, self.stream.length() - offset)?;
        Parser::new(Lexer::new(sub)?)
    }

    /// Reads one section (table or stream) and returns its trailer.
    fn read_section(&mut self, offset: usize) -> PDFResult<Dict> {
        let mut parser = self.parser_at(offset)?;
        let first = parser.get_object()?;

        if first.is_command("xref") {
            self.read_xref_table(&mut parser)?;
            return match parser.get_object()? {
                PDFObject::Dictionary(dict) => Ok(dict),
                other => Err(PDFError::MalformedXref(format!(
                    "expected trailer dictionary, got {}",
                    other.type_name()
                ))),
            };
        }

        // Otherwise this must be "N G obj << /Type /XRef ... >> stream"
        let generation = parser.get_object()?;
        let keyword = parser.get_object()?;
        if first.as_i64().is_none() || generation.as_i64().is_none() || !keyword.is_command("obj")
        {
            return Err(PDFError::MalformedXref(format!(
                "no cross-reference section at offset {}",
                offset
            )));
        }

        match parser.get_object()? {
            PDFObject::Stream { dict, data } if is_type(&dict, "XRef") => {
                self.read_xref_stream(&dict, &data)?;
                Ok(dict)
            }
            other => Err(PDFError::MalformedXref(format!(
                "object at offset {} is a {}, not an xref stream",
                offset,
                other.type_name()
            ))),
        }
    }

    fn insert_entry(&mut self, num: usize, entry: XRefEntry) {
        if num >= self.entries.len() {
            self.entries.resize(num + 1, None);
        }
        if self.entries[num].is_none() {
            self.entries[num] = Some(entry);
        }
    }

    /// Reads table subsections up to and including the `trailer` keyword.
    fn read_xref_table(&mut self, parser: &mut Parser) -> PDFResult<()> {
        loop {
            let obj = parser.get_object()?;
            if obj.is_command("trailer") {
                return Ok(());
            }

            let first = obj.as_usize();
            let count = parser.get_object()?.as_usize();
            let (Some(first), Some(count)) = (first, count) else {
                return Err(PDFError::MalformedXref(format!(
                    "invalid subsection header starting with {}",
                    obj.type_name()
                )));
            };

            for i in 0..count {
                let entry = Self::read_xref_entry(parser)?;
                self.insert_entry(first + i, entry);
            }
        }
    }

    /// Reads one `OOOOOOOOOO GGGGG n|f` entry.
    fn read_xref_entry(parser: &mut Parser) -> PDFResult<XRefEntry> {
        let offset = parser.get_object()?;
        let generation = parser.get_object()?;
        let kind = parser.get_object()?;

        let (Some(offset), Some(generation)) = (offset.as_i64(), generation.as_i64()) else {
            return Err(PDFError::MalformedXref("non-numeric table entry".into()));
        };
        let offset = u64::try_from(offset)
            .map_err(|_| PDFError::MalformedXref(format!("negative offset {}", offset)))?;
        let generation = u32::try_from(generation)
            .map_err(|_| PDFError::MalformedXref(format!("bad generation {}", generation)))?;

        match kind {
            PDFObject::Command(cmd) if cmd == "n" => Ok(XRefEntry::Uncompressed { offset, generation }),
            PDFObject::Command(cmd) if cmd == "f" => Ok(XRefEntry::Free {
                next_free: offset,
                generation,
            }),
            other => Err(PDFError::MalformedXref(format!(
                "expected 'n' or 'f' in table entry, got {}",
                other.type_name()
            ))),
        }
    }

    /// Reads the binary entries of a cross-reference stream.
    fn read_xref_stream(&mut self, dict: &Dict, data: &[u8]) -> PDFResult<()> {
        let widths: Vec<usize> = dict
            .get("W")
            .and_then(PDFObject::as_array)
            .map(|w| w.iter().filter_map(PDFObject::as_usize).collect())
            .unwrap_or_default();
        if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
            return Err(PDFError::MalformedXref(format!("invalid /W {:?}", widths)));
        }
        let entry_size: usize = widths.iter().sum();
        if entry_size == 0 {
            return Err(PDFError::MalformedXref("/W describes empty entries".into()));
        }

        let size = dict.get("Size").and_then(PDFObject::as_usize).unwrap_or(0);
        let index: Vec<usize> = match dict.get("Index").and_then(PDFObject::as_array) {
            Some(items) => items.iter().filter_map(PDFObject::as_usize).collect(),
            None => vec![0, size],
        };

        let decoded = decode::decode_stream(dict, data, self.max_decoded_bytes)?.into_data()?;
        let mut records = decoded.chunks_exact(entry_size);

        for range in index.chunks_exact(2) {
            let (first, count) = (range[0], range[1]);
            for num in first..first.saturating_add(count) {
                let Some(record) = records.next() else {
                    log::warn!("Xref stream ends before object {}", num);
                    return Ok(());
                };
                let (type_bytes, rest) = record.split_at(widths[0]);
                let (field2, field3) = rest.split_at(widths[1]);
                let kind = if widths[0] == 0 { 1 } else { read_be(type_bytes) };
                let (f2, f3) = (read_be(field2), read_be(field3));

                let entry = match kind {
                    0 => XRefEntry::Free {
                        next_free: f2,
                        generation: f3 as u32,
                    },
                    1 => XRefEntry::Uncompressed {
                        offset: f2,
                        generation: f3 as u32,
                    },
                    2 => XRefEntry::Compressed {
                        obj_stream_num: f2 as u32,
                        index: f3 as u32,
                    },
                    other => {
                        log::debug!("Ignoring xref stream entry type {} for {}", other, num);
                        continue;
                    }
                };
                self.insert_entry(num, entry);
            }
        }

        Ok(())
    }

    /// Gets an entry from the xref table.
    pub fn get_entry(&self, obj_num: u32) -> Option<&XRefEntry> {
        self.entries.get(obj_num as usize)?.as_ref()
    }

    /// Fetches an indirect object by reference.
    ///
    /// Resolves `N G R` to its value, following values that are themselves
    /// references. Results are memoized.
    pub fn fetch(&self, num: u32, generation: u32) -> PDFResult<PDFObject> {
        let mut chain = Vec::new();
        self.fetch_in_chain(num, generation, &mut chain)
    }

    fn fetch_in_chain(
        &self,
        num: u32,
        generation: u32,
        chain: &mut Vec<(u32, u32)>,
    ) -> PDFResult<PDFObject> {
        let key = (num, generation);
        if let Some(cached) = read_lock(&self.cache).get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.clone());
        }

        if chain.contains(&key) || chain.len() >= MAX_REFERENCE_DEPTH {
            return Err(PDFError::CircularReference { num, generation });
        }

        chain.push(key);
        let result = self.load(num, generation, chain).and_then(|obj| match obj {
            PDFObject::Reference {
                num: next,
                generation: next_gen,
            } => self.fetch_in_chain(next, next_gen, chain),
            obj => Ok(obj),
        });
        chain.pop();

        let obj = result?;
        self.parsed.fetch_add(1, Ordering::Relaxed);
        let mut cache = write_lock(&self.cache);
        Ok(cache.entry(key).or_insert(obj).clone())
    }

    /// Parses the object behind an entry without consulting the cache.
    fn load(
        &self,
        num: u32,
        generation: u32,
        chain: &mut Vec<(u32, u32)>,
    ) -> PDFResult<PDFObject> {
        let not_found = PDFError::ObjectNotFound { num, generation };
        match self.get_entry(num) {
            None | Some(XRefEntry::Free { .. }) => Err(not_found),
            Some(XRefEntry::Uncompressed {
                offset,
                generation: entry_gen,
            }) => {
                if *entry_gen != generation {
                    return Err(not_found);
                }
                self.read_uncompressed(num, *offset as usize, chain)
            }
            Some(XRefEntry::Compressed {
                obj_stream_num,
                index,
            }) => {
                if generation != 0 {
                    return Err(not_found);
                }
                self.read_compressed(num, *obj_stream_num, *index as usize, chain)
            }
        }
    }

    /// Parses `N G obj <value>` at a file offset.
    fn read_uncompressed(
        &self,
        num: u32,
        offset: usize,
        chain: &[(u32, u32)],
    ) -> PDFResult<PDFObject> {
        let snapshot = chain.to_vec();
        let resolver = move |n: u32, g: u32| {
            let mut chain = snapshot.clone();
            self.fetch_in_chain(n, g, &mut chain)
        };

        let mut parser = self.parser_at(offset)?;
        parser.set_ref_resolver(&resolver);

        let parsed_num = parser.get_object()?;
        let _generation = parser.get_object()?;
        let keyword = parser.get_object()?;
        if parsed_num.as_i64() != Some(num as i64) || !keyword.is_command("obj") {
            return Err(PDFError::MalformedXref(format!(
                "object {} not found at offset {}",
                num, offset
            )));
        }

        parser.get_object()
    }

    fn read_compressed(
        &self,
        num: u32,
        stream_num: u32,
        index: usize,
        chain: &mut Vec<(u32, u32)>,
    ) -> PDFResult<PDFObject> {
        let object_stream = self.object_stream(stream_num, chain)?;
        let found = match object_stream.objects.get(index) {
            Some((n, obj)) if *n == num => Some(obj),
            _ => object_stream
                .objects
                .iter()
                .find(|(n, _)| *n == num)
                .map(|(_, obj)| obj),
        };
        found
            .cloned()
            .ok_or(PDFError::ObjectNotFound { num, generation: 0 })
    }

    fn object_stream(
        &self,
        stream_num: u32,
        chain: &mut Vec<(u32, u32)>,
    ) -> PDFResult<Arc<ObjectStream>> {
        if let Some(cached) = lock(&self.object_streams).get(&stream_num) {
            return Ok(Arc::clone(cached));
        }

        let PDFObject::Stream { dict, data } = self.fetch_in_chain(stream_num, 0, chain)? else {
            return Err(PDFError::MalformedXref(format!(
                "object stream {} is not a stream",
                stream_num
            )));
        };
        let count = dict.get("N").and_then(PDFObject::as_usize).unwrap_or(0);
        let first = dict.get("First").and_then(PDFObject::as_usize).unwrap_or(0);
        let decoded = self.decode_stream(&dict, &data)?.into_data()?;
        if first > decoded.len() {
            return Err(PDFError::MalformedXref(format!(
                "object stream {} /First {} beyond data",
                stream_num, first
            )));
        }

        let buffer: Arc<[u8]> = Arc::from(decoded);
        let mut header = Parser::new(Lexer::new(Box::new(Stream::from_arc(
            Arc::clone(&buffer),
            0,
            first,
        )))?)?;

        let mut objects = Vec::with_capacity(count);
        for _ in 0..count {
            let (Some(num), Some(offset)) = (
                header.get_object()?.as_i64(),
                header.get_object()?.as_usize(),
            ) else {
                break;
            };
            let start = first + offset;
            if start >= buffer.len() {
                break;
            }
            let mut body = Parser::new(Lexer::new(Box::new(Stream::from_arc(
                Arc::clone(&buffer),
                start,
                buffer.len() - start,
            )))?)?;
            let obj = body.get_object().unwrap_or_else(|e| {
                log::warn!("Bad object {} in object stream {}: {}", num, stream_num, e);
                PDFObject::Null
            });
            objects.push((num as u32, obj));
        }

        log::trace!("Decoded object stream {} with {} objects", stream_num, objects.len());
        let object_stream = Arc::new(ObjectStream { objects });
        lock(&self.object_streams).put(stream_num, Arc::clone(&object_stream));
        Ok(object_stream)
    }

    /// Fetches an object if it's a reference, otherwise returns the object as-is.
    pub fn fetch_if_ref(&self, obj: &PDFObject) -> PDFResult<PDFObject> {
        match obj {
            PDFObject::Reference { num, generation } => self.fetch(*num, *generation),
            _ => Ok(obj.clone()),
        }
    }

    /// Looks up `key` in `dict`, resolving an indirect value.
    pub fn get(&self, dict: &Dict, key: &str) -> PDFResult<Option<PDFObject>> {
        dict.get(key).map(|v| self.fetch_if_ref(v)).transpose()
    }

    /// Decodes a stream payload, resolving indirect filter entries first.
    pub fn decode_stream(&self, dict: &Dict, data: &[u8]) -> PDFResult<DecodedStream> {
        let mut filter_dict = Dict::default();
        for key in ["Filter", "F", "DecodeParms", "DP"] {
            if let Some(value) = self.get(dict, key)? {
                let value = match value {
                    PDFObject::Array(items) => PDFObject::Array(
                        items
                            .iter()
                            .map(|item| self.fetch_if_ref(item))
                            .collect::<PDFResult<_>>()?,
                    ),
                    other => other,
                };
                filter_dict.insert(key.to_string(), value);
            }
        }
        decode::decode_stream(&filter_dict, data, self.max_decoded_bytes)
    }

    /// Returns the trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Returns the catalog (root) dictionary.
    pub fn catalog(&self) -> PDFResult<Dict> {
        let root = self
            .trailer
            .get("Root")
            .ok_or_else(|| PDFError::MalformedFile("trailer has no /Root".into()))?;
        match self.fetch_if_ref(root) {
            Ok(PDFObject::Dictionary(dict)) => Ok(dict),
            Ok(other) => Err(PDFError::MalformedFile(format!(
                "catalog is a {}, not a dictionary",
                other.type_name()
            ))),
            Err(e) => Err(PDFError::MalformedFile(format!("cannot read catalog: {}", e))),
        }
    }

    /// Returns the resolution counters.
    pub fn stats(&self) -> XRefStats {
        XRefStats {
            parsed: self.parsed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }

    /// Decoded-size limit used for streams resolved through this table.
    pub fn max_decoded_bytes(&self) -> usize {
        self.max_decoded_bytes
    }

    /// Returns the number of entries in the xref table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the xref table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_type(dict: &Dict, expected: &str) -> bool {
    dict.get("Type").and_then(PDFObject::as_name) == Some(expected)
}

fn read_be(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

// A panicking worker must not take the whole document down with it.
fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xref_over(data: &[u8], startxref: usize) -> PDFResult<XRef> {
        let mut xref = XRef::new(Stream::from_bytes(data.to_vec()), usize::MAX / 2);
        xref.parse(startxref)?;
        Ok(xref)
    }

    /// Builds "objects + xref table + trailer" with correct offsets.
    fn classic_file(objects: &[&str], trailer: &str) -> (Vec<u8>, usize) {
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for (i, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
        }
        let startxref = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
        for offset in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
        }
        out.extend_from_slice(format!("trailer\n{}\n", trailer).as_bytes());
        (out, startxref)
    }

    #[test]
    fn test_xref_entry_is_free() {
        let free_entry = XRefEntry::Free {
            next_free: 0,
            generation: 65535,
        };
        assert!(free_entry.is_free());
        assert_eq!(free_entry.generation(), 65535);

        let uncompressed_entry = XRefEntry::Uncompressed {
            offset: 100,
            generation: 5,
        };
        assert!(!uncompressed_entry.is_free());
        assert_eq!(uncompressed_entry.generation(), 5);
    }

    #[test]
    fn test_parse_xref_with_multiple_subsections() {
        let data = b"xref\n\
            0 3\n\
            0000000000 65535 f\n\
            0000000015 00000 n\n\
            0000000079 00000 n\n\
            5 1\n\
            0000000200 00002 n\n\
            trailer\n\
            << /Size 6 >>\n";

        let xref = xref_over(data, 0).unwrap();
        assert_eq!(xref.len(), 6);
        assert!(xref.get_entry(0).unwrap().is_free());
        assert_eq!(
            xref.get_entry(1),
            Some(&XRefEntry::Uncompressed {
                offset: 15,
                generation: 0
            })
        );
        assert_eq!(xref.get_entry(3), None);
        assert_eq!(xref.get_entry(5).unwrap().generation(), 2);
        assert_eq!(xref.trailer().get("Size"), Some(&PDFObject::Integer(6)));
    }

    #[test]
    fn test_fetch_and_memoize() {
        let (data, startxref) = classic_file(
            &["<< /Type /Catalog >>", "(hello)"],
            "<< /Size 3 /Root 1 0 R >>",
        );
        let xref = xref_over(&data, startxref).unwrap();

        assert_eq!(xref.fetch(2, 0).unwrap(), PDFObject::String(b"hello".to_vec()));
        assert_eq!(xref.fetch(2, 0).unwrap(), PDFObject::String(b"hello".to_vec()));
        assert_eq!(
            xref.stats(),
            XRefStats {
                parsed: 1,
                cache_hits: 1
            }
        );
        assert!(xref.catalog().unwrap().contains_key("Type"));
    }

    #[test]
    fn test_missing_free_and_wrong_generation() {
        let (data, startxref) = classic_file(&["42"], "<< /Size 2 >>");
        let xref = xref_over(&data, startxref).unwrap();

        assert_eq!(
            xref.fetch(0, 65535),
            Err(PDFError::ObjectNotFound {
                num: 0,
                generation: 65535
            })
        );
        assert_eq!(
            xref.fetch(9, 0),
            Err(PDFError::ObjectNotFound { num: 9, generation: 0 })
        );
        assert_eq!(
            xref.fetch(1, 3),
            Err(PDFError::ObjectNotFound { num: 1, generation: 3 })
        );
    }

    #[test]
    fn test_reference_chain_and_cycle() {
        let (data, startxref) = classic_file(&["2 0 R", "3 0 R", "1 0 R", "5 0 R", "7"], "<< /Size 6 >>");
        let xref = xref_over(&data, startxref).unwrap();

        assert!(matches!(
            xref.fetch(1, 0),
            Err(PDFError::CircularReference { .. })
        ));
        assert_eq!(xref.fetch(4, 0).unwrap(), PDFObject::Integer(7));
    }

    #[test]
    fn test_indirect_stream_length() {
        let (data, startxref) = classic_file(
            &["<< /Length 2 0 R >>\nstream\nabcde\nendstream", "5"],
            "<< /Size 3 >>",
        );
        let xref = xref_over(&data, startxref).unwrap();

        match xref.fetch(1, 0).unwrap() {
            PDFObject::Stream { data, .. } => assert_eq!(&data[..], b"abcde"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_prev_chain_newest_wins() {
        let (mut data, old_startxref) = classic_file(&["(old)"], "<< /Size 2 /Root 1 0 R >>");
        let new_offset = data.len();
        data.extend_from_slice(b"1 0 obj\n(new)\nendobj\n");
        let startxref = data.len();
        data.extend_from_slice(
            format!(
                "xref\n1 1\n{:010} 00000 n \ntrailer\n<< /Size 2 /Prev {} >>\n",
                new_offset, old_startxref
            )
            .as_bytes(),
        );

        let xref = xref_over(&data, startxref).unwrap();
        assert_eq!(xref.fetch(1, 0).unwrap(), PDFObject::String(b"new".to_vec()));
        // /Root only appears in the older trailer
        assert!(xref.trailer().contains_key("Root"));
        assert!(!xref.trailer().contains_key("Prev"));
    }

    #[test]
    fn test_prev_loop_is_malformed() {
        let data = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        assert!(matches!(xref_over(data, 0), Err(PDFError::MalformedXref(_))));
    }

    #[test]
    fn test_xref_stream_and_object_stream() {
        // Object stream 2 holds object 3 ("(packed)") at index 0
        let header = b"3 0 ";
        let body = b"(packed)";
        let mut objstm = format!(
            "2 0 obj\n<< /Type /ObjStm /N 1 /First {} /Length {} >>\nstream\n",
            header.len(),
            header.len() + body.len()
        )
        .into_bytes();
        objstm.extend_from_slice(header);
        objstm.extend_from_slice(body);
        objstm.extend_from_slice(b"\nendstream\nendobj\n");

        let mut data = b"%PDF-1.5\n".to_vec();
        let objstm_offset = data.len();
        data.extend_from_slice(&objstm);

        // W [1 2 1]: obj 0 free, obj 2 at objstm_offset, obj 3 in stream 2 index 0
        let mut rows = Vec::new();
        rows.extend_from_slice(&[0, 0, 0, 0]);
        rows.extend_from_slice(&[1, (objstm_offset >> 8) as u8, objstm_offset as u8, 0]);
        rows.extend_from_slice(&[2, 0, 2, 0]);
        let startxref = data.len();
        data.extend_from_slice(
            format!(
                "9 0 obj\n<< /Type /XRef /Size 4 /W [1 2 1] /Index [0 1 2 2] /Length {} >>\nstream\n",
                rows.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&rows);
        data.extend_from_slice(b"\nendstream\nendobj\n");

        let xref = xref_over(&data, startxref).unwrap();
        assert_eq!(
            xref.get_entry(3),
            Some(&XRefEntry::Compressed {
                obj_stream_num: 2,
                index: 0
            })
        );
        assert_eq!(xref.fetch(3, 0).unwrap(), PDFObject::String(b"packed".to_vec()));
        assert!(matches!(xref.fetch(3, 1), Err(PDFError::ObjectNotFound { .. })));
    }

    #[test]
    fn test_bad_offset_is_malformed() {
        assert!(matches!(xref_over(b"xref", 400), Err(PDFError::MalformedXref(_))));
        assert!(matches!(
            xref_over(b"garbage here", 0),
            Err(PDFError::MalformedXref(_))
        ));
    }
}
