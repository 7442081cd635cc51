// ============================================================================
// STROKE SCRIPTS — recorded pad input replayed without a window
// ============================================================================
//
// One command per line, `#` starts a comment:
//   down X Y      pointer pressed at logical (X, Y)
//   move X Y      pointer moved
//   up            pointer released
//   leave         pointer left the pad
//   width W       stroke width in logical px
//   color #RRGGBB stroke colour
//   clear         wipe the pad

use thiserror::Error;

use crate::canvas::{DrawingSurface, Point};
use crate::settings::parse_color;
use image::Rgba;

#[derive(Debug, Error, PartialEq)]
#[error("line {line}: {message}")]
pub struct ScriptError {
    pub line: usize,
    pub message: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StrokeCommand {
    Down(Point),
    Move(Point),
    Up,
    Leave,
    Width(f32),
    Color(Rgba<u8>),
    Clear,
}

/// Parse a stroke script into commands.
pub fn parse_script(src: &str) -> Result<Vec<StrokeCommand>, ScriptError> {
    let mut out = Vec::new();
    for (idx, raw) in src.lines().enumerate() {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        let mut kept = Vec::with_capacity(tokens.len());
        for (i, tok) in tokens.iter().enumerate() {
            // `#` opens a comment, except for the argument of `color`
            if tok.starts_with('#') && !(i == 1 && tokens[0].eq_ignore_ascii_case("color")) {
                break;
            }
            kept.push(*tok);
        }
        let Some((&cmd, args)) = kept.split_first() else {
            continue;
        };
        let err = |message: String| ScriptError { line: idx + 1, message };

        let expect_args = |n: usize| -> Result<(), ScriptError> {
            if args.len() == n {
                Ok(())
            } else {
                Err(err(format!("'{}' takes {} argument(s), got {}", cmd, n, args.len())))
            }
        };
        let num = |s: &str| -> Result<f32, ScriptError> {
            s.parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| err(format!("'{}' is not a number", s)))
        };

        let command = match cmd.to_ascii_lowercase().as_str() {
            "down" | "move" => {
                expect_args(2)?;
                let p = Point::new(num(args[0])?, num(args[1])?);
                if cmd.eq_ignore_ascii_case("down") {
                    StrokeCommand::Down(p)
                } else {
                    StrokeCommand::Move(p)
                }
            }
            "up" => {
                expect_args(0)?;
                StrokeCommand::Up
            }
            "leave" => {
                expect_args(0)?;
                StrokeCommand::Leave
            }
            "clear" => {
                expect_args(0)?;
                StrokeCommand::Clear
            }
            "width" => {
                expect_args(1)?;
                StrokeCommand::Width(num(args[0])?)
            }
            "color" => {
                expect_args(1)?;
                let c = parse_color(args[0])
                    .ok_or_else(|| err(format!("'{}' is not a colour", args[0])))?;
                StrokeCommand::Color(c)
            }
            other => return Err(err(format!("unknown command '{}'", other))),
        };
        out.push(command);
    }
    Ok(out)
}

/// Feed `commands` to `surface` in order.
pub fn replay(surface: &mut DrawingSurface, commands: &[StrokeCommand]) {
    for cmd in commands {
        match *cmd {
            StrokeCommand::Down(p) => surface.begin_stroke(p),
            StrokeCommand::Move(p) => surface.extend_stroke(p),
            StrokeCommand::Up => surface.end_stroke(),
            StrokeCommand::Leave => surface.pointer_leave(),
            StrokeCommand::Width(w) => surface.set_stroke_width(w),
            StrokeCommand::Color(c) => surface.set_stroke_color(c),
            StrokeCommand::Clear => surface.clear(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_commands() {
        let src = "# a seven\n\
                   width 25\n\
                   color #ff0000 # red\n\
                   down 10 10   # start\n\
                   move 50.5 50\n\
                   up\n\
                   \n\
                   leave\n\
                   clear\n";
        let cmds = parse_script(src).unwrap();
        assert_eq!(
            cmds,
            vec![
                StrokeCommand::Width(25.0),
                StrokeCommand::Color(Rgba([255, 0, 0, 255])),
                StrokeCommand::Down(Point::new(10.0, 10.0)),
                StrokeCommand::Move(Point::new(50.5, 50.0)),
                StrokeCommand::Up,
                StrokeCommand::Leave,
                StrokeCommand::Clear,
            ]
        );
    }

    #[test]
    fn errors_carry_line_numbers() {
        let e = parse_script("down 1 1\nscribble 3\n").unwrap_err();
        assert_eq!(e.line, 2);
        assert!(e.message.contains("scribble"));

        let e = parse_script("move 1\n").unwrap_err();
        assert_eq!(e.line, 1);

        let e = parse_script("\n\nwidth wide\n").unwrap_err();
        assert_eq!(e.line, 3);
        assert_eq!(e.to_string(), "line 3: 'wide' is not a number");

        assert!(parse_script("color #zzzzzz").is_err());
    }

    #[test]
    fn replay_drives_the_surface() {
        let mut s = DrawingSurface::new(64, 64, 1.0);
        let cmds = parse_script("width 6\ndown 8 8\nmove 56 56\nup\nmove 8 56\n").unwrap();
        replay(&mut s, &cmds);
        assert!(!s.is_active());
        assert_ne!(*s.pixels().get_pixel(32, 32), crate::canvas::BACKGROUND);
        // The move after `up` drew nothing
        assert_eq!(*s.pixels().get_pixel(20, 45), crate::canvas::BACKGROUND);
    }
}
