//! Low-level binary I/O primitives shared by the heap and table serializers.

pub mod io;
