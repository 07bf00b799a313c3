pub mod todo;

pub use uom;

pub mod mmps {

  use uom::si::{
    length::millimeter,
    mass::kilogram,
    time::picosecond,
    electric_current::ampere,
    thermodynamic_temperature::kelvin,
    amount_of_substance::mole,
    luminous_intensity::candela,
  };

  // TODO: replace with system! macro, once it has been fixed in uom
  #[allow(unused)]
  type Units = dyn uom::si::Units<
      f32,
    length                    = millimeter,
    mass                      = kilogram,
    time                      = picosecond,
    electric_current          = ampere,
    thermodynamic_temperature = kelvin,
    amount_of_substance       = mole,
    luminous_intensity        = candela>;

  pub mod f32 {
    use uom::{ISQ, system};
    ISQ!(uom::si, f32, (millimeter, kilogram, picosecond, ampere, kelvin, mole, candela));
  }

}

pub use uom::si::Quantity;
pub use mmps::f32::{Angle, Length, Ratio};

/// Memory sizes. Device memories run into tens of GiB, which `f32` storage
/// cannot represent to the byte, so these live in the standard SI system
/// with `f64` storage.
pub type Information = uom::si::f64::Information;

mod units {
  pub use uom::si::{length     ::{micrometer, millimeter, centimeter},
                    ratio      ::ratio,
                    angle      ::radian,
                    information::{byte, megabyte, mebibyte, gibibyte},
  };
}

// Making values from float literals seems to be very long-winded, so provide
// some pithily-named convenience constructors.

/// Generate a function called NAME which returns QUANTITY by interpreting its
/// argument as UNIT
///
/// wrap!(NAME QUANTITY UNIT);
macro_rules! wrap {
  ($name:ident $quantity:ident $unit:ident ) => {
    pub fn $name(x: f32) -> $quantity { $quantity::new::<units::$unit>(x) }
  };
  ($name:ident $quantity:ident $unit:ident $storage:ty) => {
    pub fn $name(x: $storage) -> $quantity { $quantity::new::<units::$unit>(x) }
  };
}

wrap!(cm     Length         centimeter);
wrap!(mm     Length         millimeter);
wrap!(um     Length         micrometer);
wrap!(ratio  Ratio               ratio);
wrap!(radian Angle              radian);

wrap!(bytes  Information  byte     f64);
wrap!(mb     Information  megabyte f64);
wrap!(mib    Information  mebibyte f64);
wrap!(gib    Information  gibibyte f64);

// Reverse direction of the above.
pub fn mm_(x: Length) -> f32 { x.get::<units::millimeter>() }
pub fn cm_(x: Length) -> f32 { x.get::<units::centimeter>() }

pub fn ratio_ (x: Ratio) -> f32 { x.get::<units::ratio>() }
pub fn radian_(x: Angle) -> f32 { x.get::<units::radian>() }

pub fn bytes_(x: Information) -> f64 { x.get::<units::byte>() }

/// Whole number of bytes, rounded to the nearest byte
pub fn n_bytes(x: Information) -> u64 { bytes_(x).round() as u64 }

#[macro_export]
macro_rules! assert_uom_eq {
  ($unit:ident, $lhs:expr, $rhs:expr, $algo:ident <= $tol:expr) => {
    float_eq::assert_float_eq!($lhs.get::<$unit>(), $rhs.get::<$unit>(), $algo <= $tol)
  };
}
