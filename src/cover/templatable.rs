use std::fmt;

use tokio::sync::watch;

/// A value that is either fixed in the configuration or worked out when it is needed.
pub enum Templatable<T> {
  Static(T),
  Lambda(Box<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> Templatable<T> {
  pub fn lambda(f: impl Fn() -> T + Send + Sync + 'static) -> Self {
    Templatable::Lambda(Box::new(f))
  }

  pub fn value(&self) -> T {
    match self {
      Templatable::Static(value) => value.clone(),
      Templatable::Lambda(f) => f(),
    }
  }
}

impl<T> From<T> for Templatable<T> {
  fn from(value: T) -> Self {
    Templatable::Static(value)
  }
}

impl<T: fmt::Debug> fmt::Debug for Templatable<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Templatable::Static(value) => f.debug_tuple("Static").field(value).finish(),
      Templatable::Lambda(_) => f.write_str("Lambda"),
    }
  }
}

/// Reports the real position of a cover, or `None` if nothing new is known
pub type StateLambda = Box<dyn FnMut() -> Option<f32> + Send>;

/// A state lambda yielding each position received on `positions` once.
pub fn feedback_lambda(mut positions: watch::Receiver<Option<f32>>) -> StateLambda {
  Box::new(move || match positions.has_changed() {
    Ok(true) => *positions.borrow_and_update(),
    _ => None,
  })
}
