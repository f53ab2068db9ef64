use billfold_core::{FieldError, Readable, ReadableMap, Record};

/// Field storage the populator reads from and writes back to.
pub trait FieldSource {
    /// Field names in declaration order.
    fn field_names(&self) -> Vec<String>;

    fn get_readable(&self, field: &str) -> Option<Readable>;

    /// Stores `value` for `field`. Implementations must keep the previous value on error.
    fn set_readable(&mut self, field: &str, value: Readable) -> Result<(), FieldError>;
}

impl FieldSource for Record {
    fn field_names(&self) -> Vec<String> {
        Record::field_names(self).map(str::to_string).collect()
    }

    fn get_readable(&self, field: &str) -> Option<Readable> {
        Record::get_readable(self, field)
    }

    fn set_readable(&mut self, field: &str, value: Readable) -> Result<(), FieldError> {
        Record::set_readable(self, field, value)
    }
}

impl FieldSource for ReadableMap {
    fn field_names(&self) -> Vec<String> {
        self.keys().cloned().collect()
    }

    fn get_readable(&self, field: &str) -> Option<Readable> {
        self.get(field).cloned()
    }

    fn set_readable(&mut self, field: &str, value: Readable) -> Result<(), FieldError> {
        self.insert(field.to_string(), value);
        Ok(())
    }
}
