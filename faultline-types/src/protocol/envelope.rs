use std::io::Write;

use uuid::Uuid;

use super::v1 as protocol;

use protocol::{Attachment, DiscardReason, Event, Stacktrace, Transaction};

/// An Envelope Item.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
#[allow(clippy::large_enum_variant)]
pub enum EnvelopeItem {
    /// An error report.
    Event(Event<'static>),
    /// A finished performance trace.
    Transaction(Transaction<'static>),
    /// An attachment with raw bytes.
    Attachment(Attachment),
}

impl From<Event<'static>> for EnvelopeItem {
    fn from(event: Event<'static>) -> Self {
        EnvelopeItem::Event(event)
    }
}

impl From<Transaction<'static>> for EnvelopeItem {
    fn from(transaction: Transaction<'static>) -> Self {
        EnvelopeItem::Transaction(transaction)
    }
}

impl From<Attachment> for EnvelopeItem {
    fn from(attachment: Attachment) -> Self {
        EnvelopeItem::Attachment(attachment)
    }
}

impl EnvelopeItem {
    /// The wire name of the item type.
    pub fn type_name(&self) -> &'static str {
        match self {
            EnvelopeItem::Event(_) => "event",
            EnvelopeItem::Transaction(_) => "transaction",
            EnvelopeItem::Attachment(_) => "attachment",
        }
    }

    /// Applies one lossy size-reduction step to the item.
    ///
    /// The reduction order is fixed: an event first drops its
    /// breadcrumbs, then truncates its largest stacktrace symmetrically
    /// from both ends; a transaction halves its span list. Returns
    /// `false` once nothing more can be removed.
    pub fn shrink(&mut self) -> bool {
        match self {
            EnvelopeItem::Event(event) => {
                if !event.breadcrumbs.is_empty() {
                    event.breadcrumbs.values.clear();
                    return true;
                }
                event
                    .exception
                    .iter_mut()
                    .filter_map(|exc| exc.stacktrace.as_mut())
                    .max_by_key(|stacktrace| stacktrace.frames.len())
                    .is_some_and(shrink_stacktrace)
            }
            EnvelopeItem::Transaction(transaction) => {
                if transaction.spans.len() > 1 {
                    let keep = transaction.spans.len() / 2;
                    transaction.spans.truncate(keep);
                    true
                } else {
                    false
                }
            }
            EnvelopeItem::Attachment(_) => false,
        }
    }
}

// Frames below this count are not worth truncating further.
const MIN_KEPT_FRAMES: usize = 8;

fn shrink_stacktrace(stacktrace: &mut Stacktrace) -> bool {
    let len = stacktrace.frames.len();
    if len <= MIN_KEPT_FRAMES {
        return false;
    }
    // Keep half the frames, split between the outermost callers and the
    // innermost callees, and record the elided range.
    let keep = len / 2;
    let head = keep.div_ceil(2);
    let tail = keep - head;
    let removed_end = len - tail;
    stacktrace.frames.drain(head..removed_end);
    stacktrace.frames_omitted = Some((head as u64, removed_end as u64));
    true
}

/// Per-item-type byte ceilings for serialized envelope items.
#[derive(Debug, Clone, Copy)]
pub struct SizeLimits {
    /// Ceiling for serialized error events.
    pub event: usize,
    /// Ceiling for serialized transactions.
    pub transaction: usize,
    /// Ceiling for attachment payloads.
    pub attachment: usize,
}

impl Default for SizeLimits {
    fn default() -> Self {
        SizeLimits {
            event: 1_000_000,
            transaction: 1_000_000,
            attachment: 20_000_000,
        }
    }
}

impl SizeLimits {
    fn for_item(&self, item: &EnvelopeItem) -> usize {
        match item {
            EnvelopeItem::Event(_) => self.event,
            EnvelopeItem::Transaction(_) => self.transaction,
            EnvelopeItem::Attachment(_) => self.attachment,
        }
    }
}

/// An Iterator over the items of an Envelope.
#[derive(Clone)]
pub struct EnvelopeItemIter<'s> {
    inner: std::slice::Iter<'s, EnvelopeItem>,
}

impl<'s> Iterator for EnvelopeItemIter<'s> {
    type Item = &'s EnvelopeItem;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// A Faultline Envelope.
///
/// An Envelope is the data format used for ingestion. It can contain
/// multiple items, some of which are related, such as an event and its
/// attachments.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Envelope {
    event_id: Option<Uuid>,
    items: Vec<EnvelopeItem>,
}

impl Envelope {
    /// Creates a new empty Envelope.
    pub fn new() -> Envelope {
        Default::default()
    }

    /// Add a new Envelope Item.
    pub fn add_item<I>(&mut self, item: I)
    where
        I: Into<EnvelopeItem>,
    {
        let item = item.into();
        if self.event_id.is_none() {
            if let EnvelopeItem::Event(ref event) = item {
                self.event_id = Some(event.event_id);
            } else if let EnvelopeItem::Transaction(ref transaction) = item {
                self.event_id = Some(transaction.event_id);
            }
        }
        self.items.push(item);
    }

    /// Create an [`Iterator`] over all the [`EnvelopeItem`]s.
    pub fn items(&self) -> EnvelopeItemIter {
        EnvelopeItemIter {
            inner: self.items.iter(),
        }
    }

    /// Returns the Envelopes Uuid, if any.
    pub fn uuid(&self) -> Option<&Uuid> {
        self.event_id.as_ref()
    }

    /// Returns whether the envelope contains no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the [`Event`] contained in this Envelope, if any.
    pub fn event(&self) -> Option<&Event<'static>> {
        self.items.iter().find_map(|item| match item {
            EnvelopeItem::Event(event) => Some(event),
            _ => None,
        })
    }

    /// Returns the [`Transaction`] contained in this Envelope, if any.
    pub fn transaction(&self) -> Option<&Transaction<'static>> {
        self.items.iter().find_map(|item| match item {
            EnvelopeItem::Transaction(transaction) => Some(transaction),
            _ => None,
        })
    }

    /// Filters the Envelope's [`EnvelopeItem`]s based on a predicate,
    /// and returns a new Envelope containing only the retained items.
    ///
    /// Attachments are only kept if the filtered Envelope still contains
    /// an event or transaction.
    ///
    /// [`None`] is returned if no items remain in the Envelope after
    /// filtering.
    pub fn filter<P>(self, mut predicate: P) -> Option<Self>
    where
        P: FnMut(&EnvelopeItem) -> bool,
    {
        let mut filtered = Envelope::new();
        for item in self.items {
            if predicate(&item) {
                filtered.add_item(item);
            }
        }

        if filtered.uuid().is_none() {
            filtered
                .items
                .retain(|item| !matches!(item, EnvelopeItem::Attachment(..)));
        }

        if filtered.items.is_empty() {
            None
        } else {
            Some(filtered)
        }
    }

    /// Serialize the Envelope into the given [`Write`].
    ///
    /// [`Write`]: std::io::Write
    pub fn to_writer<W>(&self, mut writer: W) -> std::io::Result<()>
    where
        W: Write,
    {
        self.write_header(&mut writer)?;

        let mut item_buf = Vec::new();
        for item in &self.items {
            match item {
                EnvelopeItem::Event(event) => serde_json::to_writer(&mut item_buf, event)?,
                EnvelopeItem::Transaction(transaction) => {
                    serde_json::to_writer(&mut item_buf, transaction)?
                }
                EnvelopeItem::Attachment(attachment) => {
                    attachment.to_writer(&mut writer)?;
                    writeln!(writer)?;
                    continue;
                }
            }
            write_item(&mut writer, item.type_name(), &item_buf)?;
            item_buf.clear();
        }

        Ok(())
    }

    /// Serialize the Envelope into the given [`Write`], enforcing the
    /// given per-item-type size ceilings.
    ///
    /// An over-limit item is reduced with [`EnvelopeItem::shrink`] until
    /// it fits; if it still does not fit it is skipped and reported to
    /// `dropped` with [`DiscardReason::PayloadTooLarge`]. Returns the
    /// number of items written.
    pub fn to_writer_with_limits<W>(
        &self,
        mut writer: W,
        limits: SizeLimits,
        dropped: &mut dyn FnMut(&EnvelopeItem, DiscardReason),
    ) -> std::io::Result<usize>
    where
        W: Write,
    {
        self.write_header(&mut writer)?;

        let mut written = 0;
        for item in &self.items {
            let limit = limits.for_item(item);

            if let EnvelopeItem::Attachment(attachment) = item {
                if attachment.buffer.len() > limit {
                    dropped(item, DiscardReason::PayloadTooLarge);
                    continue;
                }
                attachment.to_writer(&mut writer)?;
                writeln!(writer)?;
                written += 1;
                continue;
            }

            let mut item = item.clone();
            let mut item_buf = serialize_payload(&item)?;
            while item_buf.len() > limit && item.shrink() {
                item_buf = serialize_payload(&item)?;
            }
            if item_buf.len() > limit {
                dropped(&item, DiscardReason::PayloadTooLarge);
                continue;
            }

            write_item(&mut writer, item.type_name(), &item_buf)?;
            written += 1;
        }

        Ok(written)
    }

    fn write_header<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self.uuid() {
            Some(uuid) => writeln!(writer, r#"{{"event_id":"{uuid}"}}"#),
            None => writeln!(writer, "{{}}"),
        }
    }
}

fn serialize_payload(item: &EnvelopeItem) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    match item {
        EnvelopeItem::Event(event) => serde_json::to_writer(&mut buf, event)?,
        EnvelopeItem::Transaction(transaction) => serde_json::to_writer(&mut buf, transaction)?,
        EnvelopeItem::Attachment(attachment) => buf.extend_from_slice(&attachment.buffer),
    }
    Ok(buf)
}

fn write_item<W: Write>(writer: &mut W, type_name: &str, payload: &[u8]) -> std::io::Result<()> {
    writeln!(
        writer,
        r#"{{"type":"{}","length":{}}}"#,
        type_name,
        payload.len()
    )?;
    writer.write_all(payload)?;
    writeln!(writer)
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use protocol::{Breadcrumb, Exception, Frame, Level, Map, Values};

    fn to_str(envelope: Envelope) -> String {
        let mut vec = Vec::new();
        envelope.to_writer(&mut vec).unwrap();
        String::from_utf8_lossy(&vec).to_string()
    }

    fn timestamp() -> SystemTime {
        crate::utils::timestamp_to_datetime(1500000000.0).unwrap()
    }

    #[test]
    fn test_empty() {
        assert_eq!(to_str(Envelope::new()), "{}\n");
    }

    #[test]
    fn test_event() {
        let event_id = Uuid::parse_str("22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c").unwrap();
        let event = Event {
            event_id,
            timestamp: timestamp(),
            ..Default::default()
        };
        let mut envelope = Envelope::new();
        envelope.add_item(event);
        assert_eq!(
            to_str(envelope),
            "{\"event_id\":\"22d00b3f-d1b1-4b5d-8d20-49d138cd8a9c\"}\n\
             {\"type\":\"event\",\"length\":70}\n\
             {\"event_id\":\"22d00b3fd1b14b5d8d2049d138cd8a9c\",\"timestamp\":1500000000}\n"
        );
    }

    #[test]
    fn test_attachment_roundtrip() {
        let mut envelope = Envelope::new();
        envelope.add_item(Attachment {
            buffer: b"some content".to_vec(),
            filename: Some("file.txt".into()),
            content_type: Some("text/plain".into()),
        });
        let serialized = to_str(envelope);
        assert!(serialized.contains("\"type\":\"attachment\""));
        assert!(serialized.contains("\"filename\":\"file.txt\""));
        assert!(serialized.ends_with("some content\n"));
    }

    fn big_event() -> Event<'static> {
        let frames = (0..64)
            .map(|i| Frame {
                function: Some(format!("function_{i}")),
                abs_path: Some("/app/src/lib.rs".into()),
                lineno: Some(i),
                ..Default::default()
            })
            .collect::<Vec<_>>();
        Event {
            timestamp: timestamp(),
            level: Level::Error,
            breadcrumbs: Values::from(vec![Breadcrumb::default(); 16]),
            exception: Values::from(vec![Exception {
                ty: "OutOfCheese".into(),
                value: Some("++?????++ out of cheese error".into()),
                stacktrace: Some(Stacktrace {
                    frames,
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            extra: {
                let mut map = Map::new();
                map.insert("payload".into(), "x".repeat(512).into());
                map
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_limits_drop_breadcrumbs_first() {
        let mut envelope = Envelope::new();
        envelope.add_item(big_event());

        let full_len = {
            let mut buf = Vec::new();
            envelope.to_writer(&mut buf).unwrap();
            buf.len()
        };

        // A ceiling below the full size but far above the frame payload
        // only costs the breadcrumbs.
        let limits = SizeLimits {
            event: full_len - 100,
            ..Default::default()
        };
        let mut dropped = Vec::new();
        let mut buf = Vec::new();
        let written = envelope
            .to_writer_with_limits(&mut buf, limits, &mut |_, reason| dropped.push(reason))
            .unwrap();
        assert_eq!(written, 1);
        assert!(dropped.is_empty());
        let body = String::from_utf8_lossy(&buf);
        assert!(!body.contains("breadcrumbs"));
        assert!(body.contains("OutOfCheese"));
    }

    #[test]
    fn test_limits_truncate_frames_symmetrically() {
        let mut envelope = Envelope::new();
        envelope.add_item(big_event());

        let limits = SizeLimits {
            event: 3000,
            ..Default::default()
        };
        let mut dropped = Vec::new();
        let mut buf = Vec::new();
        let written = envelope
            .to_writer_with_limits(&mut buf, limits, &mut |_, reason| dropped.push(reason))
            .unwrap();
        assert_eq!(written, 1);
        assert!(dropped.is_empty());
        let body = String::from_utf8_lossy(&buf);
        assert!(body.contains("frames_omitted"));
        // both ends survive the cut
        assert!(body.contains("function_0"));
        assert!(body.contains("function_63"));
    }

    #[test]
    fn test_limits_drop_unshrinkable_item() {
        let mut envelope = Envelope::new();
        envelope.add_item(big_event());

        let limits = SizeLimits {
            event: 64,
            ..Default::default()
        };
        let mut dropped = Vec::new();
        let mut buf = Vec::new();
        let written = envelope
            .to_writer_with_limits(&mut buf, limits, &mut |_, reason| dropped.push(reason))
            .unwrap();
        assert_eq!(written, 0);
        assert_eq!(dropped, vec![DiscardReason::PayloadTooLarge]);
    }

    #[test]
    fn test_shrink_stacktrace_records_range() {
        let mut stacktrace = Stacktrace {
            frames: vec![Frame::default(); 100],
            ..Default::default()
        };
        assert!(shrink_stacktrace(&mut stacktrace));
        assert_eq!(stacktrace.frames.len(), 50);
        assert_eq!(stacktrace.frames_omitted, Some((25, 75)));
    }

    #[test]
    fn test_filter_strips_orphan_attachments() {
        let mut envelope = Envelope::new();
        envelope.add_item(Event::default());
        envelope.add_item(Attachment::default());
        let filtered = envelope.filter(|item| !matches!(item, EnvelopeItem::Event(_)));
        assert!(filtered.is_none());
    }
}
