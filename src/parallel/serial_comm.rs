// Single-process communication

/// Communicator of a one-process run.
///
/// Reductions are the identity. A send/receive pair where both partners are
/// present can only be a periodic self-exchange, so it is a copy.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialComm;

impl SerialComm {
    pub fn new() -> Self {
        SerialComm
    }
}

impl super::Comm for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_reduce(&self, x: f64) -> f64 {
        x
    }

    fn sendrecv(
        &self,
        send: &[f64],
        dest: Option<usize>,
        recv: &mut [f64],
        source: Option<usize>,
    ) {
        if dest.is_some() && source.is_some() {
            recv.copy_from_slice(send);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::Comm;

    #[test]
    fn self_exchange_copies() {
        let comm = SerialComm::new();
        let mut recv = [0.0; 3];
        comm.sendrecv(&[1.0, 2.0, 3.0], Some(0), &mut recv, Some(0));
        assert_eq!(recv, [1.0, 2.0, 3.0]);

        let mut untouched = [7.0; 3];
        comm.sendrecv(&[1.0, 2.0, 3.0], None, &mut untouched, None);
        assert_eq!(untouched, [7.0; 3]);
    }
}
