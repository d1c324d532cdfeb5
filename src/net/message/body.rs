use std::any::Any;
use std::fmt::Debug;

///
/// A trait that allows a type to be measured in bytes.
///
pub trait MessageBody {
    /// The length of the message body in bytes.
    fn byte_len(&self) -> usize;
}

// # Primitives

macro_rules! msg_body_primitiv {
    ($t:ty) => {
        impl MessageBody for $t {
            fn byte_len(&self) -> usize {
                std::mem::size_of::<Self>()
            }
        }
    };
}

msg_body_primitiv!(());

msg_body_primitiv!(u8);
msg_body_primitiv!(u16);
msg_body_primitiv!(u32);
msg_body_primitiv!(u64);
msg_body_primitiv!(u128);
msg_body_primitiv!(usize);

msg_body_primitiv!(i8);
msg_body_primitiv!(i16);
msg_body_primitiv!(i32);
msg_body_primitiv!(i64);
msg_body_primitiv!(i128);
msg_body_primitiv!(isize);

msg_body_primitiv!(f32);
msg_body_primitiv!(f64);

msg_body_primitiv!(bool);
msg_body_primitiv!(char);

macro_rules! msg_body_lenable {
    ($t:ty) => {
        impl MessageBody for $t {
            fn byte_len(&self) -> usize {
                self.len()
            }
        }
    };
}

msg_body_lenable!(String);
msg_body_lenable!(&str);

impl<T: MessageBody> MessageBody for Vec<T> {
    fn byte_len(&self) -> usize {
        self.iter().map(MessageBody::byte_len).sum()
    }
}

impl<T: MessageBody> MessageBody for Option<T> {
    fn byte_len(&self) -> usize {
        self.as_ref().map_or(0, MessageBody::byte_len)
    }
}

///
/// A wrapper that attaches an explicit wire size to an arbitrary value.
///
/// Useful when the simulated size of a payload differs from its in-memory
/// representation.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSizeBody<T> {
    byte_len: usize,
    inner: T,
}

impl<T> CustomSizeBody<T> {
    /// Creates a new instance with the given simulated size.
    #[must_use]
    pub fn new(byte_len: usize, inner: T) -> Self {
        Self { byte_len, inner }
    }

    /// The contained value by reference.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// The contained value, consuming `self`.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> MessageBody for CustomSizeBody<T> {
    fn byte_len(&self) -> usize {
        self.byte_len
    }
}

type DupFn = fn(&dyn Any) -> Option<Box<dyn Any>>;

///
/// A type-erased message payload.
///
pub struct Body {
    inner: Box<dyn Any>,
    byte_len: usize,
    dup: Option<DupFn>,
    ty_info: &'static str,
}

impl Body {
    /// Creates a body from a duplicable value.
    pub fn new<T: MessageBody + Any + Clone>(value: T) -> Self {
        Self {
            byte_len: value.byte_len(),
            dup: Some(|any| {
                any.downcast_ref::<T>()
                    .map(|v| Box::new(v.clone()) as Box<dyn Any>)
            }),
            inner: Box::new(value),
            ty_info: std::any::type_name::<T>(),
        }
    }

    /// Creates a body from a value that cannot be duplicated.
    pub fn new_non_duplicable<T: MessageBody + Any>(value: T) -> Self {
        Self {
            byte_len: value.byte_len(),
            dup: None,
            inner: Box::new(value),
            ty_info: std::any::type_name::<T>(),
        }
    }

    /// The simulated length of the payload in bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Indicates whether the contained value was created as an instance
    /// of type `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// The payload by reference, cast to `T` if possible.
    #[must_use]
    pub fn try_content<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// The payload by mutable reference, cast to `T` if possible.
    pub fn try_content_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.inner.downcast_mut::<T>()
    }

    /// Consumes the body, returning the payload as an instance of `T`.
    ///
    /// # Errors
    ///
    /// Returns `self` unchanged if the payload is not a `T`.
    pub fn try_cast<T: Any>(self) -> Result<T, Self> {
        let Body {
            inner,
            byte_len,
            dup,
            ty_info,
        } = self;
        match inner.downcast::<T>() {
            Ok(v) => Ok(*v),
            Err(inner) => Err(Self {
                inner,
                byte_len,
                dup,
                ty_info,
            }),
        }
    }

    /// Duplicates the payload, if the contained type supports it.
    #[must_use]
    pub fn try_dup(&self) -> Option<Self> {
        let dup = self.dup?;
        let inner = dup(&*self.inner)?;
        Some(Self {
            inner,
            byte_len: self.byte_len,
            dup: self.dup,
            ty_info: self.ty_info,
        })
    }
}

impl Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body {{ {} bytes, type: {} }}", self.byte_len, self.ty_info)
    }
}
