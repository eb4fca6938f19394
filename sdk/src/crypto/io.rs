use {
    crate::crypto::cipher::{Aes128Ofb, CipherHeader, HEADER_LEN, Password},
    ofb::cipher::StreamCipher as _,
    std::{
        io::{self, Read, Write},
        mem,
    },
};

enum State {
    /// Header is not generated (or read) yet.
    Uninitialized,
    Streaming(Aes128Ofb),
    Closed,
}

fn closed_error() -> io::Error {
    io::Error::other("cipher stream is already closed")
}

/// Encrypts everything written to it and forwards the ciphertext to `output`.
///
/// The cipher header is generated lazily on the first write, so constructing
/// the writer never touches the output or the random source.
pub struct EncryptingWriter<W> {
    output: W,
    password: Password,
    state: State,
    // Ciphertext of the current write.
    buf: Vec<u8>,
}

impl<W: Write> EncryptingWriter<W> {
    #[must_use]
    #[inline]
    pub fn new(output: W, password: Password) -> Self {
        Self {
            output,
            password,
            state: State::Uninitialized,
            buf: Vec::new(),
        }
    }

    fn start(&mut self) -> io::Result<Aes128Ofb> {
        let header = CipherHeader::generate().map_err(io::Error::other)?;
        let cipher = header.cipher(&self.password).map_err(io::Error::other)?;
        self.output.write_all(header.as_bytes())?;
        Ok(cipher)
    }

    /// Writes the header if nothing was written yet and flushes the output.
    /// Any later write fails.
    #[inline]
    pub fn close(&mut self) -> io::Result<()> {
        match mem::replace(&mut self.state, State::Closed) {
            State::Uninitialized => {
                self.start()?;
            }
            State::Streaming(_) => {}
            State::Closed => return Err(closed_error()),
        }
        self.output.flush()
    }

    #[inline]
    pub fn finish(mut self) -> io::Result<W> {
        self.close()?;
        Ok(self.output)
    }
}

impl<W: Write> Write for EncryptingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if matches!(self.state, State::Uninitialized) {
            // A failed start leaves the stream closed.
            self.state = State::Closed;
            self.state = State::Streaming(self.start()?);
        }
        let State::Streaming(cipher) = &mut self.state else {
            return Err(closed_error());
        };
        self.buf.clear();
        self.buf.extend_from_slice(buf);
        cipher.apply_keystream(&mut self.buf);
        // The keystream has already advanced, so the whole chunk must go out.
        self.output.write_all(&self.buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if matches!(self.state, State::Closed) {
            return Err(closed_error());
        }
        self.output.flush()
    }
}

/// Reads the cipher header from `input` on the first read and decrypts everything after it.
///
/// There is no authentication: a wrong password produces garbage, not an error.
pub struct DecryptingReader<R> {
    input: R,
    password: Password,
    state: State,
}

impl<R: Read> DecryptingReader<R> {
    #[must_use]
    #[inline]
    pub fn new(input: R, password: Password) -> Self {
        Self {
            input,
            password,
            state: State::Uninitialized,
        }
    }

    fn start(&mut self) -> io::Result<Aes128Ofb> {
        let mut header = [0; HEADER_LEN];
        self.input.read_exact(&mut header).map_err(|err| {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated stream: incomplete cipher header",
                )
            } else {
                err
            }
        })?;
        CipherHeader::from_bytes(header)
            .cipher(&self.password)
            .map_err(io::Error::other)
    }

    #[inline]
    pub fn close(&mut self) -> io::Result<()> {
        if matches!(self.state, State::Closed) {
            return Err(closed_error());
        }
        self.state = State::Closed;
        Ok(())
    }

    #[inline]
    pub fn finish(mut self) -> io::Result<R> {
        self.close()?;
        Ok(self.input)
    }
}

impl<R: Read> Read for DecryptingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if matches!(self.state, State::Uninitialized) {
            // A failed start leaves the stream closed.
            self.state = State::Closed;
            self.state = State::Streaming(self.start()?);
        }
        let State::Streaming(cipher) = &mut self.state else {
            return Err(closed_error());
        };
        let len = self.input.read(buf)?;
        let data = buf
            .get_mut(..len)
            .ok_or_else(|| io::Error::other("inner reader returned invalid length"))?;
        cipher.apply_keystream(data);
        Ok(len)
    }
}
