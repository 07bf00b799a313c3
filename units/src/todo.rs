/// Units which are simply type aliases for `f32` rather than having an
/// implementation as a `uom` `Quantity`.
///
/// This may be because:
///
/// + There are complications in the client code which make using `uom`
///   difficult (the cone-beam projection arithmetic mixes lengths with pixel
///   counts freely), so we use plain `f32`s, but still want some clues in the
///   source as to what they represent.
///
/// + They might not be difficult to implement, but we haven't had the time to
///   think about it.

pub type Lengthf32 = f32;
pub type Pixelf32  = f32; // detector offsets are measured in pixels
pub type Intensityf32 = f32; // TODO uom Intensity
