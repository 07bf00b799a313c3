use std::str::FromStr;

use geometry::RegionOfInterest;
use units::{n_bytes, Information};

/// Parse `x1,x2,y1,y2,z1,z2` into a region of interest
pub fn parse_roi(s: &str) -> Result<RegionOfInterest, String> {
    let v = parse_list::<u32>(s)?;
    let &[x1, x2, y1, y2, z1, z2] = &v[..] else {
        return Err(format!("expected 6 comma-separated voxel coordinates, got {}", v.len()));
    };
    Ok(RegionOfInterest::new((x1, x2), (y1, y2), (z1, z2)))
}

/// Parse a memory size with units, such as `16 GiB` or `600 MB`, into bytes
pub fn parse_memory(s: &str) -> Result<u64, String> {
    s.trim().parse::<Information>()
        .map(n_bytes)
        .map_err(|e| format!("`{s}` is not a memory size (try something like `16 GiB`): {e}"))
}

fn parse_list<T>(s: &str) -> Result<Vec<T>, String>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    s.split(',')
        .map(|item| item.trim().parse::<T>().map_err(|e| format!("`{item}`: {e}")))
        .collect()
}

/// Group numeric digits to facilitate reading long numbers
pub fn group_digits<F: std::fmt::Display>(n: F) -> String {
    use numsep::{separate, Locale};
    separate(n, Locale::English)
}


pub mod timing {

    use super::group_digits;
    use std::time::Instant;
    use std::io::Write;

    pub struct Progress {
        previous: Instant,
    }

    impl Progress {

        #[allow(clippy::new_without_default)]
        pub fn new() -> Self { Self { previous: Instant::now() } }

        /// Print message, append ellipsis, flush stdout, stay on same line, start timer.
        pub fn start(&mut self, message: &str) {
            print!("{message} ... ");
            // Only cosmetic if it fails
            std::io::stdout().flush().ok();
            self.start_timer();
        }

        // Print time elapsed since last start or done
        pub fn done(&mut self) {
            println!("{} ms", group_digits(self.previous.elapsed().as_millis()));
            self.start_timer();
        }

        // Print message followed by time elapsed since last start or done
        pub fn done_with_message(&mut self, message: &str) {
            println!("{message}: {} ms",
                     group_digits(self.previous.elapsed().as_millis()));
            self.start_timer();
        }

        fn start_timer(&mut self) { self.previous = Instant::now() }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest(/**/      n       , expected       ,
             case(          0  , "0"            ),
             case(        999  , "999"          ),
             case(      40_000 , "40,000"       ),
             case(17_179_869_184, "17,179,869,184"),
    )]
    fn digits_are_grouped(n: u64, expected: &str) {
        assert_eq!(group_digits(n), expected);
    }

    #[test]
    fn roi_from_command_line() {
        assert_eq!(parse_roi("0,99, 10,20,5,6"),
                   Ok(RegionOfInterest::new((0, 99), (10, 20), (5, 6))));
    }

    #[rstest(/**/ input,
             case("0,99,10,20,5"),
             case("0,99,10,20,5,6,7"),
             case("0,99,10,20,5,x"),
             case("0,99,10,20,5,-6"),
             case(""),
    )]
    fn malformed_roi(input: &str) {
        assert!(parse_roi(input).is_err());
    }

    #[rstest(/**/ input      , expected      ,
             case("16 GiB"   , 17_179_869_184),
             case("600 MB"   ,    600_000_000),
             case(" 512 MiB ",   536_870_912),
    )]
    fn memory_sizes(input: &str, expected: u64) {
        assert_eq!(parse_memory(input), Ok(expected));
    }

    #[test]
    fn memory_needs_units() {
        assert!(parse_memory("1000").is_err());
    }
}
