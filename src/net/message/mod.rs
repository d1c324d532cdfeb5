//! Generic network messages.

use crate::net::gate::GateRef;
use crate::net::module::ModuleId;
use std::any::Any;
use std::fmt::Display;

mod body;
pub use body::*;

mod header;
pub use header::*;

///
/// The unit of scheduling and inter-module communication.
///
/// A message is composed of a [`Header`] containing generic scheduling and
/// addressing metadata, and an optional [`Body`] carrying an arbitrary
/// typed payload. Messages are owned values: sending or scheduling a
/// message transfers it to the kernel, delivery transfers it back to the
/// receiving module.
///
#[derive(Debug)]
#[must_use]
pub struct Message {
    pub(crate) header: Box<Header>,
    pub(crate) content: Option<Body>,
}

impl Message {
    /// Starts building a new message.
    pub fn new() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// Constructs a message from its raw parts.
    ///
    /// The header is boxed for improved internal layout.
    pub fn from_raw_parts(header: Box<Header>, body: Option<Body>) -> Self {
        Self {
            header,
            content: body,
        }
    }

    /// The metadata attached to the message.
    #[inline]
    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The metadata attached to the message.
    #[inline]
    #[must_use]
    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// The length of the message in bytes, either the explicitly
    /// configured length or the length of the payload.
    #[must_use]
    pub fn length(&self) -> usize {
        if self.header.length != 0 {
            self.header.length
        } else {
            self.content.as_ref().map_or(0, Body::byte_len)
        }
    }

    /// The length of the message in bits.
    #[must_use]
    pub fn bit_len(&self) -> usize {
        self.length() * 8
    }

    /// A short identifier used in log output.
    #[must_use]
    pub fn str(&self) -> String {
        format!("#{} kind:{}", self.header.id, self.header.kind)
    }

    pub(crate) fn internal(typ: u8, arrival: ModuleId) -> Self {
        let mut header = Header::default();
        header.typ = typ;
        header.sender_module = arrival;
        header.arrival_module = arrival;
        Self {
            header: Box::new(header),
            content: None,
        }
    }
}

// # Content accessing

impl Message {
    /// The payload by reference, cast to `T` if it is one.
    #[must_use]
    pub fn try_content<T: Any>(&self) -> Option<&T> {
        self.content.as_ref().and_then(Body::try_content::<T>)
    }

    /// The payload by reference, cast to `T`.
    ///
    /// # Panics
    ///
    /// Panics if there is no payload or the payload is not a `T`.
    #[must_use]
    pub fn content<T: Any>(&self) -> &T {
        self.try_content()
            .expect("message content is not of the requested type")
    }

    /// The payload by mutable reference, cast to `T` if it is one.
    pub fn try_content_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.content.as_mut().and_then(Body::try_content_mut::<T>)
    }

    /// Indicates whether the payload is an instance of `T`.
    #[must_use]
    pub fn can_cast<T: Any>(&self) -> bool {
        self.content.as_ref().is_some_and(Body::is::<T>)
    }

    /// Consumes the message, returning the payload and the header.
    ///
    /// # Errors
    ///
    /// Returns the message unchanged if there is no payload or the
    /// payload is not a `T`.
    pub fn try_cast<T: Any>(self) -> Result<(T, Header), Self> {
        let Message { header, content } = self;
        match content {
            Some(body) => match body.try_cast() {
                Ok(value) => Ok((value, *header)),
                Err(body) => Err(Self::from_raw_parts(header, Some(body))),
            },
            None => Err(Self::from_raw_parts(header, None)),
        }
    }

    /// Performs a [`try_cast`](Message::try_cast), unwrapping the result.
    ///
    /// # Panics
    ///
    /// Panics if the cast fails.
    #[must_use]
    pub fn cast<T: Any>(self) -> (T, Header) {
        self.try_cast()
            .ok()
            .expect("message content is not of the requested type")
    }

    /// Duplicates the message as a fresh, unscheduled message with a new
    /// identifier. Duplication is an explicit operation; the kernel never
    /// copies payloads on send.
    #[must_use]
    pub fn try_dup(&self) -> Option<Self> {
        Some(Self {
            header: Box::new(self.header.dup()),
            content: match &self.content {
                Some(body) => Some(body.try_dup()?),
                None => None,
            },
        })
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Message {{ {} {} bytes {:?} }}",
            self.str(),
            self.length(),
            self.content
        )
    }
}

///
/// A builder for [`Message`] instances.
///
#[derive(Debug)]
#[must_use]
pub struct MessageBuilder {
    header: Box<Header>,
    content: Option<Body>,
}

impl MessageBuilder {
    /// Creates a builder over an all-default message.
    pub fn new() -> Self {
        Self {
            header: Box::new(Header::default()),
            content: None,
        }
    }

    /// Sets the message kind field.
    pub fn kind(mut self, kind: MessageKind) -> Self {
        self.header.kind = kind;
        self
    }

    /// Sets the scheduling priority field. Lower values dispatch first
    /// among messages arriving at the same instant.
    pub fn priority(mut self, priority: i16) -> Self {
        self.header.priority = priority;
        self
    }

    /// Sets an explicit message length in bytes, overriding the payload
    /// length.
    pub fn length(mut self, bytes: usize) -> Self {
        self.header.length = bytes;
        self
    }

    /// Sets the arrival gate field.
    pub fn arrival_gate(mut self, gate: GateRef) -> Self {
        self.header.arrival_gate = Some(gate);
        self
    }

    /// Attaches a payload to the message.
    pub fn content<T>(mut self, value: T) -> Self
    where
        T: MessageBody + Any + Clone,
    {
        self.content = Some(Body::new(value));
        self
    }

    /// Attaches a payload that cannot be duplicated.
    pub fn content_non_duplicable<T>(mut self, value: T) -> Self
    where
        T: MessageBody + Any,
    {
        self.content = Some(Body::new_non_duplicable(value));
        self
    }

    /// Finalizes the message.
    pub fn build(self) -> Message {
        Message {
            header: self.header,
            content: self.content,
        }
    }
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<MessageBuilder> for Message {
    fn from(builder: MessageBuilder) -> Self {
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_content_access() {
        let msg = Message::new().kind(7).content(String::from("Hello world!")).build();
        assert!(msg.can_cast::<String>());
        assert_eq!(msg.content::<String>(), "Hello world!");
        assert_eq!(msg.length(), 12);
        assert_eq!(msg.bit_len(), 96);

        let (value, header) = msg.cast::<String>();
        assert_eq!(value, "Hello world!");
        assert_eq!(header.kind, 7);
    }

    #[test]
    fn message_explicit_length() {
        let msg = Message::new().length(100).content(42u8).build();
        assert_eq!(msg.length(), 100);
    }

    #[test]
    fn message_dup_assigns_new_id() {
        let msg = Message::new().kind(3).content(1u64).build();
        let dup = msg.try_dup().expect("u64 payloads are duplicable");
        assert_eq!(dup.header().kind, 3);
        assert_ne!(dup.header().id, msg.header().id);
        assert_eq!(dup.content::<u64>(), msg.content::<u64>());
    }

    #[test]
    fn message_cast_failure_preserves_message() {
        let msg = Message::new().content(1u32).build();
        let msg = msg.try_cast::<String>().unwrap_err();
        assert!(msg.can_cast::<u32>());
    }
}
