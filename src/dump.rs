//! A structured printer for dumping parsed tables.
//!
//! Dump output is a tree of labelled dictionary and list scopes containing
//! key/value lines. The table dumpers drive any [`ScopedPrinter`]
//! implementation; [`IndentPrinter`] renders the tree as indented text.

use std::fmt;
use std::ops::{Deref, DerefMut};

/// A sink for structured dump output.
///
/// Scopes must be closed in LIFO order. Use [`DictScope`] and [`ListScope`]
/// rather than calling the `open_*`/`close_*` methods directly, so that every
/// opened scope is closed on every exit path.
pub trait ScopedPrinter {
    /// Open a labelled dictionary scope.
    fn open_dict(&mut self, label: &str);

    /// Close the most recently opened dictionary scope.
    fn close_dict(&mut self);

    /// Open a labelled list scope.
    fn open_list(&mut self, label: &str);

    /// Close the most recently opened list scope.
    fn close_list(&mut self);

    /// Print a key/value line with the value in hexadecimal.
    fn print_hex(&mut self, key: &str, value: u64);

    /// Print a key/value line with the value in decimal.
    fn print_number(&mut self, key: &str, value: u64);

    /// Print a key/value line with a string value.
    fn print_string(&mut self, key: &str, value: &str);

    /// Begin a free-form line at the current indentation and return the text
    /// sink to write it to. The caller terminates the line with `'\n'`.
    fn start_line(&mut self) -> &mut dyn fmt::Write;
}

/// A dictionary scope that closes itself when dropped.
pub struct DictScope<'printer, P: ScopedPrinter + ?Sized> {
    printer: &'printer mut P,
}

impl<'printer, P: ScopedPrinter + ?Sized> DictScope<'printer, P> {
    /// Open a dictionary scope labelled `label` on `printer`.
    pub fn new(printer: &'printer mut P, label: &str) -> DictScope<'printer, P> {
        printer.open_dict(label);
        DictScope { printer }
    }
}

impl<'printer, P: ScopedPrinter + ?Sized> Drop for DictScope<'printer, P> {
    fn drop(&mut self) {
        self.printer.close_dict();
    }
}

impl<'printer, P: ScopedPrinter + ?Sized> Deref for DictScope<'printer, P> {
    type Target = P;
    fn deref(&self) -> &P {
        self.printer
    }
}

impl<'printer, P: ScopedPrinter + ?Sized> DerefMut for DictScope<'printer, P> {
    fn deref_mut(&mut self) -> &mut P {
        self.printer
    }
}

/// A list scope that closes itself when dropped.
pub struct ListScope<'printer, P: ScopedPrinter + ?Sized> {
    printer: &'printer mut P,
}

impl<'printer, P: ScopedPrinter + ?Sized> ListScope<'printer, P> {
    /// Open a list scope labelled `label` on `printer`.
    pub fn new(printer: &'printer mut P, label: &str) -> ListScope<'printer, P> {
        printer.open_list(label);
        ListScope { printer }
    }
}

impl<'printer, P: ScopedPrinter + ?Sized> Drop for ListScope<'printer, P> {
    fn drop(&mut self) {
        self.printer.close_list();
    }
}

impl<'printer, P: ScopedPrinter + ?Sized> Deref for ListScope<'printer, P> {
    type Target = P;
    fn deref(&self) -> &P {
        self.printer
    }
}

impl<'printer, P: ScopedPrinter + ?Sized> DerefMut for ListScope<'printer, P> {
    fn deref_mut(&mut self) -> &mut P {
        self.printer
    }
}

/// A [`ScopedPrinter`] that renders scopes as two-space-indented text.
///
/// Write errors from the underlying sink cannot be reported through scope
/// drops and are swallowed; render into a `String` to make writes infallible.
#[derive(Debug)]
pub struct IndentPrinter<W: fmt::Write> {
    out: W,
    indent: usize,
}

impl<W: fmt::Write> IndentPrinter<W> {
    /// Construct a new `IndentPrinter` writing to `out`.
    pub fn new(out: W) -> IndentPrinter<W> {
        IndentPrinter { out, indent: 0 }
    }

    /// Consume the printer and return the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn pad(&mut self) {
        for _ in 0..self.indent {
            let _ = self.out.write_str("  ");
        }
    }

    fn line(&mut self, text: fmt::Arguments) {
        self.pad();
        let _ = self.out.write_fmt(text);
        let _ = self.out.write_char('\n');
    }
}

impl<W: fmt::Write> ScopedPrinter for IndentPrinter<W> {
    fn open_dict(&mut self, label: &str) {
        self.line(format_args!("{} {{", label));
        self.indent += 1;
    }

    fn close_dict(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line(format_args!("}}"));
    }

    fn open_list(&mut self, label: &str) {
        self.line(format_args!("{} [", label));
        self.indent += 1;
    }

    fn close_list(&mut self) {
        self.indent = self.indent.saturating_sub(1);
        self.line(format_args!("]"));
    }

    fn print_hex(&mut self, key: &str, value: u64) {
        self.line(format_args!("{}: 0x{:x}", key, value));
    }

    fn print_number(&mut self, key: &str, value: u64) {
        self.line(format_args!("{}: {}", key, value));
    }

    fn print_string(&mut self, key: &str, value: &str) {
        self.line(format_args!("{}: {}", key, value));
    }

    fn start_line(&mut self) -> &mut dyn fmt::Write {
        self.pad();
        &mut self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_indent_printer_scopes() {
        let mut printer = IndentPrinter::new(String::new());
        {
            let mut dict = DictScope::new(&mut printer, "Header");
            dict.print_hex("Magic", 0x1234);
            dict.print_number("Count", 2);
            {
                let mut list = ListScope::new(&mut *dict, "Items");
                let _ = writeln!(list.start_line(), "first");
            }
        }
        let out = printer.into_inner();
        assert_eq!(
            out,
            "Header {\n  Magic: 0x1234\n  Count: 2\n  Items [\n    first\n  ]\n}\n"
        );
    }

    #[test]
    fn test_scopes_close_on_early_exit() {
        fn emit(printer: &mut IndentPrinter<String>, fail: bool) {
            let mut dict = DictScope::new(printer, "Outer");
            if fail {
                return;
            }
            dict.print_number("Unreached", 0);
        }

        let mut printer = IndentPrinter::new(String::new());
        emit(&mut printer, true);
        let out = printer.into_inner();
        assert_eq!(out, "Outer {\n}\n");
    }

    #[test]
    fn test_print_string() {
        let mut printer = IndentPrinter::new(String::new());
        printer.print_string("Augmentation", "'LLVM0700'");
        assert_eq!(printer.into_inner(), "Augmentation: 'LLVM0700'\n");
    }
}
